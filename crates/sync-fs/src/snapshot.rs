//! Cross-run snapshot persistence.
//!
//! Mirrors the index-plus-data-file layout used for single-node O(1) cache
//! lookups upstream: a small index (offsets keyed by relative path, root,
//! write timestamp) is fully deserialized on open, while the entry payloads
//! live in an append-only data file accessed by byte offset through an
//! `mmap`. The wire encoding is `bincode`, matching what that layout
//! actually writes despite its own "rkyv" module name.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{FsError, FsResult};

#[derive(Serialize, Deserialize, Debug, Clone)]
struct SnapshotIndex {
    root: String,
    written_at: i64,
    /// Byte offset into the data file, keyed by relative path. Insertion
    /// order of this map is irrelevant; ordering is carried by `order`.
    offsets: HashMap<String, u64>,
    /// Relative paths in (depth, path) order, the order entries must be
    /// replayed in to reproduce the write-time snapshot.
    order: Vec<String>,
}

/// A previous run's recorded entries for one root, loaded lazily from disk.
pub struct Snapshot {
    index: SnapshotIndex,
    mmap: Option<Mmap>,
}

fn stable_hash(root: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    root.hash(&mut hasher);
    hasher.finish()
}

fn paths_for(cache_dir: &Path, root: &str) -> (PathBuf, PathBuf) {
    let digest = format!("{:016x}", stable_hash(root));
    (
        cache_dir.join(format!("{digest}.idx")),
        cache_dir.join(format!("{digest}.dat")),
    )
}

impl Snapshot {
    /// An empty snapshot, as if no prior run exists for this root.
    pub fn empty(root: &str) -> Self {
        Snapshot {
            index: SnapshotIndex {
                root: root.to_string(),
                written_at: 0,
                offsets: HashMap::new(),
                order: Vec::new(),
            },
            mmap: None,
        }
    }

    /// Loads the snapshot for `root` from `cache_dir`, if one exists.
    /// A missing or malformed snapshot yields an empty one rather than an
    /// error: snapshot load failure is non-fatal to the run.
    pub fn load(cache_dir: &Path, root: &str) -> Self {
        let (index_path, data_path) = paths_for(cache_dir, root);

        let index = fs::read(&index_path)
            .ok()
            .and_then(|bytes| bincode::deserialize::<SnapshotIndex>(&bytes).ok());

        let Some(index) = index else {
            return Snapshot::empty(root);
        };

        let mmap = File::open(&data_path)
            .ok()
            .and_then(|file| unsafe { Mmap::map(&file) }.ok());

        Snapshot { index, mmap }
    }

    /// Writes `entries` (already ordered by (depth, path)) as the next
    /// run's prior snapshot for `root`. Idempotent on an empty slice.
    pub fn save(cache_dir: &Path, root: &str, entries: &[Entry]) -> FsResult<()> {
        fs::create_dir_all(cache_dir).map_err(FsError::Io)?;
        let (index_path, data_path) = paths_for(cache_dir, root);

        let mut offsets = HashMap::new();
        let mut order = Vec::with_capacity(entries.len());

        let tmp_data = data_path.with_extension("dat.tmp");
        {
            let mut data_file = File::create(&tmp_data).map_err(FsError::Io)?;
            let mut offset = 0u64;
            for entry in entries {
                let serialized = bincode::serialize(entry).map_err(FsError::Encode)?;
                let len = serialized.len() as u32;
                data_file.write_all(&len.to_le_bytes()).map_err(FsError::Io)?;
                data_file.write_all(&serialized).map_err(FsError::Io)?;
                offsets.insert(entry.relative_path.clone(), offset);
                order.push(entry.relative_path.clone());
                offset += 4 + serialized.len() as u64;
            }
            data_file.sync_all().map_err(FsError::Io)?;
        }
        fs::rename(&tmp_data, &data_path).map_err(FsError::Io)?;

        let index = SnapshotIndex {
            root: root.to_string(),
            written_at: chrono::Utc::now().timestamp(),
            offsets,
            order,
        };
        let encoded = bincode::serialize(&index).map_err(FsError::Encode)?;
        let tmp_index = index_path.with_extension("idx.tmp");
        {
            let mut f = File::create(&tmp_index).map_err(FsError::Io)?;
            f.write_all(&encoded).map_err(FsError::Io)?;
            f.sync_all().map_err(FsError::Io)?;
        }
        fs::rename(&tmp_index, &index_path).map_err(FsError::Io)?;

        Ok(())
    }

    pub fn root(&self) -> &str {
        &self.index.root
    }

    pub fn written_at(&self) -> i64 {
        self.index.written_at
    }

    /// The exact entry recorded at `relative_path`, if any.
    pub fn get(&self, relative_path: &str) -> Option<Entry> {
        let offset = *self.index.offsets.get(relative_path)?;
        self.read_at(offset)
    }

    /// The first entry whose final path component is `name`, matching by
    /// last component rather than full path (`match_full_path=false`).
    pub fn get_by_final_component(&self, name: &str) -> Option<Entry> {
        for path in &self.index.order {
            if path.rsplit('/').next() == Some(name) {
                if let Some(offset) = self.index.offsets.get(path) {
                    if let Some(entry) = self.read_at(*offset) {
                        return Some(entry);
                    }
                }
            }
        }
        None
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.index
            .order
            .iter()
            .filter_map(|path| {
                self.index
                    .offsets
                    .get(path)
                    .and_then(|offset| self.read_at(*offset))
            })
            .collect()
    }

    fn read_at(&self, offset: u64) -> Option<Entry> {
        let mmap = self.mmap.as_ref()?;
        let slice = &mmap[offset as usize..];
        if slice.len() < 4 {
            return None;
        }
        let len = u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]) as usize;
        if slice.len() < 4 + len {
            return None;
        }
        bincode::deserialize(&slice[4..4 + len]).ok()
    }
}
