//! Orchestration facade: wires a pair of filesystem views, a filter set, the
//! comparer and the executor into the two top-level operations an operator
//! drives — comparing two roots and synching a reconciled plan.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

use sync_compare::{CompareEvent, CompareOptions, Comparer};
use sync_exec::{Executor, SynchEvent};
use sync_filters::FilterSet;
use sync_fs::FsView;
use sync_path::{PathFlavor, SyncPath};
use sync_plan::PlanTree;
use sync_transfer::TransferEngine;

pub use sync_compare::SyncMode;
pub use sync_plan::{Action, ActionDirection, ActionKind, SyncStatus};

/// Opens a filesystem view rooted at `root`, backed by `engine`, with its
/// previous-run snapshot read from `cache_dir`.
pub fn open_view(flavor: PathFlavor, root: &str, engine: Arc<dyn TransferEngine>, cache_dir: PathBuf) -> Result<FsView> {
    let path = SyncPath::new(flavor, root).with_context(|| format!("invalid root path: {root}"))?;
    Ok(FsView::new(path, engine, cache_dir))
}

/// Snapshots both roots, then compares them under `mode`, producing a plan
/// tree. This is the core's one comparison entry point; callers edit the
/// returned tree before passing it to [`synch`].
pub async fn compare_tree(
    src: &mut FsView,
    dst: &mut FsView,
    filters: &FilterSet,
    options: &CompareOptions,
    events: Option<&Sender<CompareEvent>>,
) -> Result<PlanTree> {
    src.load().await.context("loading source filesystem view")?;
    dst.load().await.context("loading destination filesystem view")?;
    Comparer::compare_with_events(src, dst, filters, options, events)
        .await
        .context("comparing source and destination")
}

/// Drives a (possibly user-edited) plan tree to completion against `engine`,
/// bounded to `capacity` concurrent in-flight actions, then flushes both
/// views' snapshots.
pub async fn apply_changes(
    tree: &mut PlanTree,
    src: &mut FsView,
    dst: &mut FsView,
    engine: Arc<dyn TransferEngine>,
    capacity: usize,
    events: Option<&Sender<SynchEvent>>,
) -> Result<()> {
    let executor = Executor::new(engine, capacity);
    executor.run(tree, src, dst, events).await.context("executing plan tree")
}

/// Cooperatively cancels an in-flight synch: stops pending engine jobs and
/// polls every action once more so none remain `in_progress`.
pub async fn abort_synch(tree: &mut PlanTree, engine: Arc<dyn TransferEngine>) -> Result<()> {
    let executor = Executor::new(engine, 1);
    executor.abort(tree).await.context("aborting plan tree execution")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_transfer::local::LocalTransferEngine;

    #[tokio::test]
    async fn compare_then_synch_round_trips_a_fresh_file() {
        let tmp = tempfile::tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(src_dir.join("hello.txt"), b"hi").await.unwrap();

        let engine: Arc<dyn TransferEngine> = Arc::new(LocalTransferEngine::new());
        let mut src = open_view(PathFlavor::Posix, src_dir.to_str().unwrap(), engine.clone(), src_dir.join(".cache")).unwrap();
        let mut dst = open_view(PathFlavor::Posix, dst_dir.to_str().unwrap(), engine.clone(), dst_dir.join(".cache")).unwrap();

        let filters = FilterSet::new();
        let options = CompareOptions {
            mode: SyncMode::Sync,
            deep: false,
        };
        let mut tree = compare_tree(&mut src, &mut dst, &filters, &options, None).await.unwrap();

        apply_changes(&mut tree, &mut src, &mut dst, engine, 4, None).await.unwrap();

        assert!(tokio::fs::metadata(dst_dir.join("hello.txt")).await.is_ok());
        assert_eq!(tree.get("hello.txt").unwrap().status, SyncStatus::Success);
    }
}
