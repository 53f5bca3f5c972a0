use tempfile::TempDir;

use crate::record::Sale;
use crate::storage::{AvlIndex, PersistenceMode, SlotIndex};

/// A deterministic sale for `id`, so tests can compare whole records.
pub fn sale(id: i32) -> Sale {
    Sale::new(id, format!("Producto{id}"), id, 1.5, "2025-01-01")
}

pub fn keys(sales: &[Sale]) -> Vec<i32> {
    sales.iter().map(|s| s.id).collect()
}

pub fn slot(index: u32) -> SlotIndex {
    SlotIndex::new(index).expect("valid slot index")
}

/// Open a fresh index in its own temporary directory.
///
/// The file is `index.avl` inside the returned directory, which is deleted
/// when the `TempDir` is dropped.
pub fn temp_index(mode: PersistenceMode) -> (TempDir, AvlIndex<Sale>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let index = AvlIndex::open_with_mode(dir.path().join("index.avl"), mode).expect("open index");
    (dir, index)
}
