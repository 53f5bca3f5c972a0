#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

// Life of an operation:
// 1. Read the root slot index from the file header
// 2. Walk down the tree one slot read at a time, comparing keys
// 3. For mutations:
//     - Append new nodes at the end of the file
//     - Rewrite every slot whose links or height changed on the way back up
//     - Rewrite the header if the root moved
//    In rewrite mode steps 1-3 run against an in-memory copy of the file,
//    which is then written back whole if anything changed
//
// Nothing is cached between operations: the file is the only state.

pub mod config;
pub mod record;
pub mod storage;

#[cfg(test)]
mod testing;
