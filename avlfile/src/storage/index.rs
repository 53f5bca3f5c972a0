//! The public record index.
//!
//! `AvlIndex` ties a file path, a record type and a persistence mode together
//! and runs each operation through a fresh `AvlTree`. Nothing about the tree
//! is kept in memory between calls.

use std::fs;
use std::path::{Path, PathBuf};

use crate::record::Record;
use crate::storage::avl::{AvlError, AvlTree, TreeReport};
use crate::storage::file::SlotFile;
use crate::storage::io::{SlotStore, StorageError};
use crate::storage::memory::MemorySlots;

/// How mutations reach the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Touched slots are rewritten where they are. `O(log n)` I/O per
    /// operation, not crash-atomic.
    #[default]
    InPlace,
    /// The whole file is loaded, updated in memory and swapped in through a
    /// rename, so a crash leaves the old or the new file. `O(n)` I/O per
    /// operation.
    Rewrite,
}

impl PersistenceMode {
    /// Name used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InPlace => "in-place",
            Self::Rewrite => "rewrite",
        }
    }
}

impl std::str::FromStr for PersistenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-place" => Ok(Self::InPlace),
            "rewrite" => Ok(Self::Rewrite),
            other => Err(format!(
                "unknown persistence mode '{other}' (expected 'in-place' or 'rewrite')"
            )),
        }
    }
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file-backed AVL index of `R` records.
///
/// All operations take `&mut self`: the file supports a single writer, and
/// callers sharing an index across threads must put it behind a lock.
pub struct AvlIndex<R: Record> {
    file: SlotFile<R>,
    mode: PersistenceMode,
}

impl<R: Record> AvlIndex<R> {
    /// Open (or create) an index file, updating it in place.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AvlError> {
        Self::open_with_mode(path, PersistenceMode::InPlace)
    }

    /// Open (or create) an index file with an explicit persistence mode.
    pub fn open_with_mode(
        path: impl Into<PathBuf>,
        mode: PersistenceMode,
    ) -> Result<Self, AvlError> {
        let file = SlotFile::open(path)?;
        tracing::debug!("opened index {} ({mode})", file.path().display());
        Ok(Self { file, mode })
    }

    /// Path of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Persistence mode chosen at open time.
    #[must_use]
    pub const fn mode(&self) -> PersistenceMode {
        self.mode
    }

    /// Look up a record by key.
    pub fn search(&mut self, key: R::Key) -> Result<Option<R>, AvlError> {
        self.run(|store| AvlTree::new(store).search(key))
    }

    /// Insert a record. Returns `false` if the key was already present.
    pub fn insert(&mut self, record: R) -> Result<bool, AvlError> {
        self.run(|store| AvlTree::new(store).insert(record))
    }

    /// Delete a record by key. Returns the removed record, or `None` if absent.
    pub fn delete(&mut self, key: R::Key) -> Result<Option<R>, AvlError> {
        self.run(|store| AvlTree::new(store).delete(key))
    }

    /// Records with `low <= key <= high` in ascending key order.
    pub fn range_search(&mut self, low: R::Key, high: R::Key) -> Result<Vec<R>, AvlError> {
        self.run(|store| AvlTree::new(store).range_search(low, high))
    }

    /// Every record in ascending key order.
    pub fn records(&mut self) -> Result<Vec<R>, AvlError> {
        self.run(|store| AvlTree::new(store).records())
    }

    /// Height of the tree (0 when empty).
    pub fn height(&mut self) -> Result<i32, AvlError> {
        self.run(|store| AvlTree::new(store).height())
    }

    /// Walk the whole tree and report invariant violations.
    pub fn verify(&mut self) -> Result<TreeReport<R::Key>, AvlError> {
        self.run(|store| AvlTree::new(store).verify())
    }

    fn run<T>(
        &mut self,
        op: impl FnOnce(&mut dyn SlotStore<Record = R>) -> Result<T, AvlError>,
    ) -> Result<T, AvlError> {
        match self.mode {
            PersistenceMode::InPlace => op(&mut self.file),
            PersistenceMode::Rewrite => {
                let image = fs::read(self.file.path()).map_err(StorageError::Io)?;
                let mut slots = MemorySlots::<R>::from_image(image)?;
                let out = op(&mut slots)?;

                if slots.is_dirty() {
                    self.file.replace(slots.image())?;
                    tracing::debug!(
                        "rewrote {} ({} bytes)",
                        self.file.path().display(),
                        slots.image().len()
                    );
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Sale;
    use crate::testing::{keys, sale, temp_index};

    const SCENARIO: [i32; 5] = [10, 5, 15, 2, 7];

    fn populate(index: &mut AvlIndex<Sale>, ids: &[i32]) {
        for &id in ids {
            assert!(index.insert(sale(id)).expect("insert"));
        }
    }

    #[test]
    fn test_scenario_in_place() {
        let (_dir, mut index) = temp_index(PersistenceMode::InPlace);
        populate(&mut index, &SCENARIO);

        assert_eq!(index.search(7).expect("search"), Some(sale(7)));
        assert_eq!(index.height().expect("height"), 3);
        assert_eq!(keys(&index.range_search(3, 12).expect("range")), vec![5, 7, 10]);

        assert_eq!(index.delete(10).expect("delete"), Some(sale(10)));
        assert_eq!(index.search(10).expect("search"), None);
        assert!(index.verify().expect("verify").is_valid());
    }

    #[test]
    fn test_file_layout() {
        let (_dir, mut index) = temp_index(PersistenceMode::InPlace);
        populate(&mut index, &SCENARIO);

        let bytes = fs::read(index.path()).expect("read");
        assert_eq!(bytes.len(), 4 + SCENARIO.len() * 64);
        // no rotations: 10 stays the root in slot 0
        assert_eq!(&bytes[0..4], &0i32.to_le_bytes());
        // slot 0 links to 5 (slot 1) and 15 (slot 2), height 3
        let links: Vec<u8> = [1i32, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(&bytes[4 + 52..4 + 64], links.as_slice());
    }

    #[test]
    fn test_delete_absent_key_leaves_file_unchanged() {
        let (_dir, mut index) = temp_index(PersistenceMode::InPlace);
        populate(&mut index, &SCENARIO);
        let before = fs::read(index.path()).expect("read");

        assert_eq!(index.delete(999).expect("delete"), None);
        assert_eq!(fs::read(index.path()).expect("read"), before);
    }

    #[test]
    fn test_duplicate_insert_is_idempotent() {
        let (_dir, mut index) = temp_index(PersistenceMode::InPlace);
        populate(&mut index, &SCENARIO);
        let before = fs::read(index.path()).expect("read");

        assert!(!index.insert(sale(7)).expect("insert"));
        assert_eq!(fs::read(index.path()).expect("read"), before);
        assert_eq!(
            keys(&index.records().expect("records")),
            vec![2, 5, 7, 10, 15]
        );
    }

    #[test]
    fn test_reopen_sees_existing_tree() {
        let (dir, mut index) = temp_index(PersistenceMode::InPlace);
        populate(&mut index, &[1, 2, 3, 4, 5, 6, 7]);
        drop(index);

        let mut reopened = AvlIndex::<Sale>::open(dir.path().join("index.avl")).expect("reopen");
        assert_eq!(reopened.height().expect("height"), 3);
        assert_eq!(reopened.search(4).expect("search"), Some(sale(4)));
    }

    #[test]
    fn test_modes_produce_identical_files() {
        let (_a, mut in_place) = temp_index(PersistenceMode::InPlace);
        let (_b, mut rewrite) = temp_index(PersistenceMode::Rewrite);

        for index in [&mut in_place, &mut rewrite] {
            populate(index, &[50, 20, 80, 10, 30, 25, 27, 90, 95, 1]);
            index.delete(20).expect("delete");
            index.delete(999).expect("delete absent");
            index.insert(sale(26)).expect("insert");
            index.delete(80).expect("delete");
        }

        assert_eq!(
            fs::read(in_place.path()).expect("read"),
            fs::read(rewrite.path()).expect("read")
        );
        assert_eq!(
            keys(&rewrite.records().expect("records")),
            vec![1, 10, 25, 26, 27, 30, 50, 90, 95]
        );
        assert!(rewrite.verify().expect("verify").is_valid());
    }

    #[test]
    fn test_rewrite_mode_leaves_no_staging_file() {
        let (dir, mut index) = temp_index(PersistenceMode::Rewrite);
        populate(&mut index, &SCENARIO);
        index.delete(5).expect("delete");

        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("index.avl")]);
        assert_eq!(keys(&index.records().expect("records")), vec![2, 7, 10, 15]);
    }

    #[test]
    fn test_rewrite_mode_skips_write_when_unchanged() {
        let (_dir, mut index) = temp_index(PersistenceMode::Rewrite);
        populate(&mut index, &SCENARIO);
        let modified = fs::metadata(index.path())
            .and_then(|m| m.modified())
            .expect("mtime");

        std::thread::sleep(std::time::Duration::from_millis(20));
        index.search(7).expect("search");
        index.delete(999).expect("delete");
        assert!(!index.insert(sale(5)).expect("insert"));

        let after = fs::metadata(index.path())
            .and_then(|m| m.modified())
            .expect("mtime");
        assert_eq!(modified, after);
    }

    #[test]
    fn test_shared_behind_mutex() {
        let (_dir, index) = temp_index(PersistenceMode::InPlace);
        let index = std::sync::Mutex::new(index);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let index = &index;
                scope.spawn(move || {
                    for id in (0..25).map(|i| i * 4 + worker) {
                        let mut guard = index.lock().expect("lock");
                        assert!(guard.insert(sale(id)).expect("insert"));
                    }
                });
            }
        });

        let mut index = index.into_inner().expect("lock");
        assert_eq!(
            keys(&index.records().expect("records")),
            (0..100).collect::<Vec<_>>()
        );
        assert!(index.verify().expect("verify").is_valid());
    }

    #[test]
    fn test_persistence_mode_parsing() {
        assert_eq!(
            "in-place".parse::<PersistenceMode>(),
            Ok(PersistenceMode::InPlace)
        );
        assert_eq!(
            "rewrite".parse::<PersistenceMode>(),
            Ok(PersistenceMode::Rewrite)
        );
        assert!("bulk".parse::<PersistenceMode>().is_err());
        assert_eq!(PersistenceMode::default().to_string(), "in-place");
    }
}
