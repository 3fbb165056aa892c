use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use sync_path::SyncPath;
use sync_transfer::{EntryRecord, TransferEngine};

use crate::entry::{Entry, EntryKind};
use crate::error::{FsError, FsResult};
use crate::snapshot::Snapshot;

fn depth_of(path: &str) -> usize {
    if path == "." {
        0
    } else {
        path.matches('/').count() + 1
    }
}

fn sort_key(path: &str) -> (usize, &str) {
    (depth_of(path), path)
}

fn record_to_entry(record: EntryRecord) -> Entry {
    let hidden = record.name.starts_with('.');
    Entry {
        relative_path: record.path,
        kind: if record.is_dir {
            EntryKind::Directory
        } else {
            EntryKind::Regular
        },
        size: if record.is_dir { None } else { record.size },
        mtime: record.mtime,
        exists: true,
        checksum: None,
        hidden,
    }
}

/// Owns a root [`SyncPath`], an in-memory per-path entry cache populated by
/// a single recursive snapshot, and the prior run's snapshot for the same
/// root (used to refine additions from deletions — see the comparer).
pub struct FsView {
    root: SyncPath,
    cache: HashMap<String, Entry>,
    order: Vec<String>,
    previous: Snapshot,
    engine: Arc<dyn TransferEngine>,
    cache_dir: PathBuf,
}

impl FsView {
    pub fn new(root: SyncPath, engine: Arc<dyn TransferEngine>, cache_dir: PathBuf) -> Self {
        let previous = Snapshot::load(&cache_dir, root.absolute_path());
        FsView {
            root,
            cache: HashMap::new(),
            order: Vec::new(),
            previous,
            engine,
            cache_dir,
        }
    }

    pub fn root(&self) -> &SyncPath {
        &self.root
    }

    /// Snapshots the root recursively via the engine's listing call,
    /// populating the listing and entry caches. Fails with `NotFound` if
    /// the root does not exist.
    pub async fn load(&mut self) -> FsResult<()> {
        if !self
            .engine
            .exists(self.root.absolute_path(), ".")
            .await
            .map_err(FsError::Engine)?
        {
            return Err(FsError::NotFound(self.root.absolute_path().to_string()));
        }

        let records = self
            .engine
            .list(self.root.absolute_path(), ".", true)
            .await
            .map_err(FsError::Engine)?;

        self.cache.clear();
        self.order.clear();
        for record in records {
            let mut entry = record_to_entry(record);
            self.carry_forward_checksum(&mut entry);
            self.order.push(entry.relative_path.clone());
            self.cache.insert(entry.relative_path.clone(), entry);
        }
        self.order.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Ok(())
    }

    /// Copies the previous run's checksum onto `entry` when its size and
    /// mtime haven't changed since that run, so deep comparisons can skip
    /// re-hashing unchanged files.
    fn carry_forward_checksum(&self, entry: &mut Entry) {
        if let Some(previous) = self.previous.get(&entry.relative_path) {
            if previous.checksum.is_some()
                && previous.size == entry.size
                && previous.mtime == entry.mtime
            {
                entry.checksum = previous.checksum;
            }
        }
    }

    /// Immediate children of `relative_path`, consulting the listing cache
    /// when populated, else the engine directly.
    pub async fn ls(&self, relative_path: &str) -> FsResult<Vec<Entry>> {
        if !self.cache.is_empty() {
            let prefix = if relative_path == "." {
                String::new()
            } else {
                format!("{relative_path}/")
            };
            return Ok(self
                .order
                .iter()
                .filter_map(|p| self.cache.get(p))
                .filter(|e| {
                    let rest = e.relative_path.strip_prefix(&prefix);
                    match rest {
                        Some(r) if !prefix.is_empty() => !r.is_empty() && !r.contains('/'),
                        _ => false,
                    }
                })
                .cloned()
                .collect());
        }

        let records = self
            .engine
            .list(self.root.absolute_path(), relative_path, false)
            .await
            .map_err(FsError::Engine)?;
        Ok(records.into_iter().map(record_to_entry).collect())
    }

    /// All cached entries in path-component order.
    pub fn walk(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(|p| self.cache.get(p))
    }

    /// A fully populated entry; fails with `NotFound` if missing.
    pub fn get_entry(&self, relative_path: &str) -> FsResult<Entry> {
        self.cache
            .get(relative_path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(relative_path.to_string()))
    }

    /// The matching entry from the prior snapshot, if any.
    /// `match_full_path=false` matches by final component (first hit wins).
    pub fn get_previous_entry(&self, relative_path: &str, match_full_path: bool) -> Option<Entry> {
        if match_full_path {
            self.previous.get(relative_path)
        } else {
            let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
            self.previous.get_by_final_component(name)
        }
    }

    /// Mutates the per-run cache. Raises if the path is not under the root.
    pub fn set_entry(&mut self, relative_path: &str, entry: Option<Entry>) -> FsResult<()> {
        let full = self.root.visit(relative_path);
        if !full.is_under_root() {
            return Err(FsError::OutsideRoot {
                path: full.absolute_path().to_string(),
                root: self.root.absolute_path().to_string(),
            });
        }

        match entry {
            Some(e) => {
                if !self.cache.contains_key(relative_path) {
                    self.order.push(relative_path.to_string());
                    self.order.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
                }
                self.cache.insert(relative_path.to_string(), e);
            }
            None => {
                self.cache.remove(relative_path);
                self.order.retain(|p| p != relative_path);
            }
        }
        Ok(())
    }

    /// Writes the per-run cache as the next run's prior snapshot, entries
    /// ordered by (depth, path). Idempotent if the cache is empty.
    pub fn flush(&self) -> FsResult<()> {
        let entries: Vec<Entry> = self
            .order
            .iter()
            .filter_map(|p| self.cache.get(p).cloned())
            .collect();
        Snapshot::save(&self.cache_dir, self.root.absolute_path(), &entries)
    }

    /// True iff the root matches any engine-declared remote.
    pub async fn is_remote(&self) -> FsResult<bool> {
        let remotes = self.engine.list_remotes().await.map_err(FsError::Engine)?;
        Ok(remotes
            .iter()
            .any(|r| self.root.absolute_path().starts_with(&r.root)))
    }

    /// Returns the cached checksum, else the previous run's checksum if size
    /// and mtime are unchanged, else asks the engine (which may refuse for
    /// remotes that cannot hash server-side); caches a hit on success.
    pub async fn get_checksum(&mut self, relative_path: &str) -> FsResult<Option<String>> {
        if let Some(entry) = self.cache.get(relative_path) {
            if entry.checksum.is_some() {
                return Ok(entry.checksum.clone());
            }
        }

        if let Some(entry) = self.cache.get_mut(relative_path) {
            if let Some(previous) = self.previous.get(relative_path) {
                if previous.checksum.is_some()
                    && previous.size == entry.size
                    && previous.mtime == entry.mtime
                {
                    entry.checksum = previous.checksum.clone();
                    return Ok(entry.checksum.clone());
                }
            }
        }

        let remote = self.is_remote().await?;
        let checksum = self
            .engine
            .checksum(self.root.absolute_path(), relative_path, remote)
            .await
            .map_err(FsError::Engine)?;

        if let Some(entry) = self.cache.get_mut(relative_path) {
            entry.checksum = checksum.clone();
        }
        Ok(checksum)
    }
}
