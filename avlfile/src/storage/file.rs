//! Index file I/O.
//!
//! Every call opens the file, seeks, reads or writes, and closes it again.
//! No handle survives between calls, so changes made by someone else between
//! two calls are visible to the next one. Only one writer is supported.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::record::Record;
use crate::storage::io::{SlotStore, StorageError};
use crate::storage::node::Node;
use crate::storage::slot::{
    HEADER_SIZE, HEADER_SIZE_U64, SlotIndex, decode_link, encode_link, slot_count,
};

/// A slot store backed by a file on disk.
#[derive(Debug)]
pub struct SlotFile<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> SlotFile<R> {
    /// Slot size as u64 for offset calculations.
    const SLOT_SIZE_U64: u64 = Node::<R>::SIZE as u64;

    /// Open the index file at `path`, initializing it if needed.
    ///
    /// A missing file, or one shorter than the header, is (re)written as an
    /// empty tree. Any other file is left untouched.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let needs_init = match fs::metadata(&path) {
            Ok(meta) => meta.len() < HEADER_SIZE_U64,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(StorageError::Io(e)),
        };

        if needs_init {
            fs::write(&path, encode_link(None).to_le_bytes())?;
            tracing::debug!("initialized empty index file at {}", path.display());
        }

        Ok(Self {
            path,
            _record: PhantomData,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the whole file with `image` in one step.
    ///
    /// The image goes to a sibling `.tmp` file, is synced, and is then renamed
    /// over the index, so a crash leaves either the old file or the new one.
    pub fn replace(&self, image: &[u8]) -> Result<(), StorageError> {
        let tmp = self.staging_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(image)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// `<index file name>.tmp` next to the index file.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map_or_else(OsString::new, ToOwned::to_owned);
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn open_writable(&self) -> Result<File, StorageError> {
        Ok(OpenOptions::new().write(true).open(&self.path)?)
    }
}

impl<R: Record> SlotStore for SlotFile<R> {
    type Record = R;

    fn read_header(&mut self) -> Result<Option<SlotIndex>, StorageError> {
        let mut file = File::open(&self.path)?;

        let mut buf = [0u8; HEADER_SIZE];
        if let Err(e) = file.read_exact(&mut buf) {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                let len = file.metadata()?.len();
                return Err(StorageError::MissingHeader { len });
            }
            return Err(StorageError::Io(e));
        }

        decode_link(i32::from_le_bytes(buf)).map_err(StorageError::CorruptHeader)
    }

    fn write_header(&mut self, root: Option<SlotIndex>) -> Result<(), StorageError> {
        let mut file = self.open_writable()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&encode_link(root).to_le_bytes())?;
        Ok(())
    }

    fn read_slot(&mut self, index: SlotIndex) -> Result<Option<Node<R>>, StorageError> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();

        let offset = index.byte_offset(Node::<R>::SIZE);
        if offset + Self::SLOT_SIZE_U64 > len {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; Node::<R>::SIZE];
        file.read_exact(&mut buf)?;

        Node::decode(&buf)
            .map(Some)
            .map_err(|source| StorageError::CorruptSlot { index, source })
    }

    fn write_slot(&mut self, index: SlotIndex, node: &Node<R>) -> Result<(), StorageError> {
        let mut file = self.open_writable()?;
        let count = slot_count(file.metadata()?.len(), Node::<R>::SIZE);
        if index.get() >= count {
            return Err(StorageError::SlotOutOfBounds {
                index,
                slot_count: count,
            });
        }

        file.seek(SeekFrom::Start(index.byte_offset(Node::<R>::SIZE)))?;
        file.write_all(&node.encode())?;
        Ok(())
    }

    fn append_slot(&mut self, node: &Node<R>) -> Result<SlotIndex, StorageError> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;

        let len = file.metadata()?.len();
        if len < HEADER_SIZE_U64 {
            return Err(StorageError::MissingHeader { len });
        }
        if (len - HEADER_SIZE_U64) % Self::SLOT_SIZE_U64 != 0 {
            return Err(StorageError::TornTail { len });
        }
        if slot_count(len, Node::<R>::SIZE) >= SlotIndex::MAX {
            return Err(StorageError::SlotSpaceExhausted);
        }

        file.write_all(&node.encode())?;

        let new_len = file.metadata()?.len();
        let index = (new_len - HEADER_SIZE_U64) / Self::SLOT_SIZE_U64 - 1;
        u32::try_from(index)
            .ok()
            .and_then(SlotIndex::new)
            .ok_or(StorageError::SlotSpaceExhausted)
    }

    fn slot_count(&mut self) -> Result<u32, StorageError> {
        let len = fs::metadata(&self.path)?.len();
        Ok(slot_count(len, Node::<R>::SIZE))
    }
}
