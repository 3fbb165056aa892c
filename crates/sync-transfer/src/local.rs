//! A `tokio::fs`-backed [`TransferEngine`] for exercising the core against
//! a real engine without the out-of-scope remote backend. It demonstrates
//! the contract; it is not meant as the production engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::{EngineError, EngineResult, EntryRecord, JobHandle, JobState, Remote, TransferEngine};

fn full_path(root: &str, relative: &str) -> std::path::PathBuf {
    if relative == "." || relative.is_empty() {
        Path::new(root).to_path_buf()
    } else {
        Path::new(root).join(relative)
    }
}

/// `path`'s tail relative to `root`, `/`-separated regardless of platform.
/// `EntryRecord.path` is a relative key, not an absolute one — callers pair
/// records across two different roots by this string.
fn relative_to_root(root: &str, path: &std::path::Path) -> String {
    let tail = path.strip_prefix(root).unwrap_or(path);
    tail.to_string_lossy().replace('\\', "/")
}

async fn stat_path(root: &str, path: &std::path::Path) -> EngineResult<Option<EntryRecord>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => {
            let mtime: Option<DateTime<Utc>> = meta.modified().ok().map(DateTime::<Utc>::from);
            Ok(Some(EntryRecord {
                path: relative_to_root(root, path),
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: if meta.is_dir() { None } else { Some(meta.len()) },
                mtime,
                is_dir: meta.is_dir(),
            }))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EngineError::Io(e)),
    }
}

/// Jobs finish synchronously the moment they're submitted; `jobs()` simply
/// replays whatever terminal state each handle last reached.
pub struct LocalTransferEngine {
    next_job: AtomicU64,
    jobs: Mutex<HashMap<u64, JobState>>,
}

impl Default for LocalTransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTransferEngine {
    pub fn new() -> Self {
        LocalTransferEngine {
            next_job: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TransferEngine for LocalTransferEngine {
    async fn list_remotes(&self) -> EngineResult<Vec<Remote>> {
        Ok(Vec::new())
    }

    async fn list(
        &self,
        root: &str,
        relative: &str,
        recursive: bool,
    ) -> EngineResult<Vec<EntryRecord>> {
        let base = full_path(root, relative);
        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let mut rd = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(EngineError::NotFound(dir.to_string_lossy().into_owned()))
                }
                Err(e) => return Err(EngineError::Io(e)),
            };
            while let Some(entry) = rd.next_entry().await.map_err(EngineError::Io)? {
                let path = entry.path();
                if let Some(record) = stat_path(root, &path).await? {
                    let is_dir = record.is_dir;
                    out.push(record);
                    if recursive && is_dir {
                        stack.push(path);
                    }
                }
            }
            if !recursive {
                break;
            }
        }
        Ok(out)
    }

    async fn stat(&self, root: &str, relative: &str) -> EngineResult<Option<EntryRecord>> {
        stat_path(root, &full_path(root, relative)).await
    }

    async fn exists(&self, root: &str, relative: &str) -> EngineResult<bool> {
        Ok(stat_path(root, &full_path(root, relative)).await?.is_some())
    }

    async fn checksum(
        &self,
        root: &str,
        relative: &str,
        _remote: bool,
    ) -> EngineResult<Option<String>> {
        let path = full_path(root, relative);
        let bytes = tokio::fs::read(&path).await.map_err(EngineError::Io)?;
        let digest = Sha256::digest(&bytes);
        Ok(Some(format!("{digest:x}")))
    }

    async fn copy_file(
        &self,
        src_root: &str,
        src_rel: &str,
        dst_root: &str,
        dst_rel: &str,
    ) -> EngineResult<JobHandle> {
        let src = full_path(src_root, src_rel);
        let dst = full_path(dst_root, dst_rel);
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(EngineError::Io)?;
        }
        let result = tokio::fs::copy(&src, &dst).await;
        let id = self.next_job.fetch_add(1, Ordering::SeqCst);
        let state = match result {
            Ok(_) => JobState::Finished,
            Err(e) => {
                self.jobs.lock().insert(id, JobState::Failed);
                return Err(EngineError::Io(e));
            }
        };
        self.jobs.lock().insert(id, state);
        Ok(JobHandle(id))
    }

    async fn delete_file(&self, root: &str, relative: &str) -> EngineResult<()> {
        let path = full_path(root, relative);
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(path.to_string_lossy().into_owned())
            } else {
                EngineError::Io(e)
            }
        })
    }

    async fn rmdir(&self, root: &str, relative: &str) -> EngineResult<()> {
        let path = full_path(root, relative);
        tokio::fs::remove_dir(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::Other || e.raw_os_error() == Some(39) {
                EngineError::NotEmpty(path.to_string_lossy().into_owned())
            } else {
                EngineError::Io(e)
            }
        })
    }

    async fn jobs(&self) -> EngineResult<Vec<(JobHandle, JobState)>> {
        Ok(self
            .jobs
            .lock()
            .iter()
            .map(|(id, state)| (JobHandle(*id), *state))
            .collect())
    }

    async fn stop_pending_jobs(&self) -> EngineResult<()> {
        let mut jobs = self.jobs.lock();
        for state in jobs.values_mut() {
            if matches!(state, JobState::InProgress | JobState::NotStarted) {
                *state = JobState::Failed;
            }
        }
        Ok(())
    }
}
