//! The narrow asynchronous contract consumed by the filesystem view and the
//! executor. The core never talks to a filesystem or a remote directly; it
//! talks to whatever implements [`TransferEngine`].

mod error;
#[cfg(feature = "local")]
pub mod local;

pub use error::{EngineError, EngineResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A listed or stat'd filesystem object as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Relative to the queried root, `/`-separated. Never an absolute
    /// filesystem path — two roots must agree on this key for the same
    /// logical file.
    pub path: String,
    pub name: String,
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// Opaque handle to an in-flight engine job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(pub u64);

/// Engine-reported state of a job, polled through [`TransferEngine::jobs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    NotStarted,
    InProgress,
    Finished,
    Failed,
}

/// The kind of remote an engine knows how to reach, as reported by
/// [`TransferEngine::list_remotes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub kind: String,
    pub root: String,
}

/// The capability set {list, stat, copy, delete, hash} that the core
/// depends on. A single trait object is threaded through the filesystem
/// view and the executor; the core never downcasts it.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    async fn list_remotes(&self) -> EngineResult<Vec<Remote>>;

    async fn list(
        &self,
        root: &str,
        relative: &str,
        recursive: bool,
    ) -> EngineResult<Vec<EntryRecord>>;

    async fn stat(&self, root: &str, relative: &str) -> EngineResult<Option<EntryRecord>>;

    async fn exists(&self, root: &str, relative: &str) -> EngineResult<bool>;

    /// May return `Ok(None)` when the remote forbids server-side hashing.
    async fn checksum(
        &self,
        root: &str,
        relative: &str,
        remote: bool,
    ) -> EngineResult<Option<String>>;

    async fn copy_file(
        &self,
        src_root: &str,
        src_rel: &str,
        dst_root: &str,
        dst_rel: &str,
    ) -> EngineResult<JobHandle>;

    async fn delete_file(&self, root: &str, relative: &str) -> EngineResult<()>;

    /// Fails loudly if the directory is not empty.
    async fn rmdir(&self, root: &str, relative: &str) -> EngineResult<()>;

    /// Current state of every job the engine knows about.
    async fn jobs(&self) -> EngineResult<Vec<(JobHandle, JobState)>>;

    async fn stop_pending_jobs(&self) -> EngineResult<()>;
}
