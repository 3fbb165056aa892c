use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use sync_fs::FsView;
use sync_plan::{Action, ActionDirection, ActionKind, PlanTree, SyncStatus};
use sync_transfer::TransferEngine;

use crate::error::{ExecError, ExecResult};
use crate::events::{self, SynchEvent};

/// Updates a filesystem view's per-run cache to reflect a successfully
/// applied action: the destination side gains the source's entry, or a
/// side loses its entry, depending on direction.
fn flush_action(action: &Action, src: &mut FsView, dst: &mut FsView) -> ExecResult<()> {
    if action.status != SyncStatus::Success {
        return Ok(());
    }

    match action.kind {
        ActionKind::NoOp => {}
        ActionKind::Copy { .. } => match action.direction {
            Some(ActionDirection::SrcToDst) => dst.set_entry(&action.b.relative_path, Some(action.a.clone()))?,
            Some(ActionDirection::DstToSrc) => src.set_entry(&action.a.relative_path, Some(action.b.clone()))?,
            _ => {}
        },
        ActionKind::Delete => {
            if matches!(action.direction, Some(ActionDirection::SrcToDst) | Some(ActionDirection::Both)) {
                dst.set_entry(&action.b.relative_path, None)?;
            }
            if matches!(action.direction, Some(ActionDirection::DstToSrc) | Some(ActionDirection::Both)) {
                src.set_entry(&action.a.relative_path, None)?;
            }
        }
    }
    Ok(())
}

/// Partitions queued paths into everything-else then directory deletions
/// (sorted by descending path so deeper paths are removed first), per the
/// ordering rule: executing (ii) before (i) maximises the chance a
/// directory is empty before its own removal is attempted.
fn build_queue(tree: &PlanTree) -> Vec<String> {
    let mut others = Vec::new();
    let mut dir_deletes = Vec::new();

    for path in tree.paths() {
        let action = match tree.get(&path) {
            Some(a) => a,
            None => continue,
        };
        if action.excluded || matches!(action.kind, ActionKind::NoOp) || action.status == SyncStatus::Success {
            continue;
        }
        if matches!(action.kind, ActionKind::Delete) && action.is_folder() {
            dir_deletes.push(path);
        } else {
            others.push(path);
        }
    }

    dir_deletes.sort_by(|a, b| b.cmp(a));
    others.extend(dir_deletes);
    others
}

/// Drives a plan tree's actions to completion through a bounded-concurrency
/// window over a transfer engine.
pub struct Executor {
    engine: Arc<dyn TransferEngine>,
    capacity: usize,
}

impl Executor {
    pub fn new(engine: Arc<dyn TransferEngine>, capacity: usize) -> Self {
        Executor {
            engine,
            capacity: capacity.max(1),
        }
    }

    /// Runs the full lifecycle: initial sweep, bounded dispatch loop, final
    /// sweep flushing both filesystem views.
    pub async fn run(
        &self,
        tree: &mut PlanTree,
        src: &mut FsView,
        dst: &mut FsView,
        events: Option<&crossbeam_channel::Sender<SynchEvent>>,
    ) -> ExecResult<()> {
        events::notify(events, SynchEvent::BeforeSynching);

        for path in tree.paths() {
            if let Some(action) = tree.get_mut(&path) {
                let _ = action.retry();
            }
        }

        let mut queue: VecDeque<String> = build_queue(tree).into();
        let semaphore = Arc::new(Semaphore::new(self.capacity));
        let mut in_flight: Vec<(String, OwnedSemaphorePermit)> = Vec::new();

        while !queue.is_empty() || !in_flight.is_empty() {
            while !queue.is_empty() {
                let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let path = queue.pop_front().expect("checked non-empty above");
                let action = tree.get_mut(&path).ok_or_else(|| ExecError::MissingNode(path.clone()))?;
                action.apply(self.engine.as_ref()).await?;
                in_flight.push((path, permit));
            }

            let mut still_in_flight = Vec::with_capacity(in_flight.len());
            for (path, permit) in in_flight.drain(..) {
                let action = tree.get_mut(&path).ok_or_else(|| ExecError::MissingNode(path.clone()))?;
                action.update_status(self.engine.as_ref()).await?;
                if matches!(action.status, SyncStatus::Success | SyncStatus::Failed) {
                    drop(permit);
                } else {
                    still_in_flight.push((path, permit));
                }
            }
            in_flight = still_in_flight;

            let active: Vec<String> = queue.iter().cloned().chain(in_flight.iter().map(|(p, _)| p.clone())).collect();
            events::notify(events, SynchEvent::OnSynching { active });

            if !queue.is_empty() || !in_flight.is_empty() {
                tokio::task::yield_now().await;
            }
        }

        for path in tree.paths() {
            if let Some(action) = tree.get(&path) {
                flush_action(action, src, dst)?;
            }
        }
        src.flush()?;
        dst.flush()?;

        events::notify(events, SynchEvent::AfterSynching);
        Ok(())
    }

    /// Cooperative cancellation: stops pending engine jobs, then polls every
    /// action once more so none remain `in_progress`.
    pub async fn abort(&self, tree: &mut PlanTree) -> ExecResult<()> {
        self.engine.stop_pending_jobs().await?;
        for path in tree.paths() {
            if let Some(action) = tree.get_mut(&path) {
                if action.status == SyncStatus::InProgress {
                    action.update_status(self.engine.as_ref()).await?;
                    if action.status == SyncStatus::InProgress {
                        action.status = SyncStatus::Failed;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_fs::{Entry, EntryKind};
    use sync_path::{PathFlavor, SyncPath};
    use sync_transfer::local::LocalTransferEngine;

    async fn view_on(root: &std::path::Path) -> FsView {
        let engine = Arc::new(LocalTransferEngine::new());
        let path = SyncPath::new(PathFlavor::Posix, root.to_str().unwrap()).unwrap();
        let mut view = FsView::new(path, engine, root.join(".cache"));
        view.load().await.unwrap();
        view
    }

    #[tokio::test]
    async fn run_drives_copy_to_success_and_flushes_destination_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(src_dir.join("a.txt"), b"hello").await.unwrap();

        let mut src = view_on(&src_dir).await;
        let mut dst = view_on(&dst_dir).await;

        let mut tree = PlanTree::new(src_dir.to_str().unwrap(), dst_dir.to_str().unwrap());
        let a = Entry::new("a.txt", EntryKind::Regular);
        let b = Entry::missing("a.txt");
        let action = Action::copy(a, b, src_dir.to_str().unwrap(), dst_dir.to_str().unwrap(), ActionDirection::SrcToDst).unwrap();
        tree.insert(action).unwrap();

        let engine: Arc<dyn TransferEngine> = Arc::new(LocalTransferEngine::new());
        let executor = Executor::new(engine, 4);
        executor.run(&mut tree, &mut src, &mut dst, None).await.unwrap();

        assert_eq!(tree.get("a.txt").unwrap().status, SyncStatus::Success);
        assert!(tokio::fs::metadata(dst_dir.join("a.txt")).await.is_ok());
    }

    #[test]
    fn directory_deletions_are_ordered_deepest_first() {
        let mut tree = PlanTree::new("/src", "/dst");
        for path in ["dir", "dir/sub"] {
            let a = Entry::new(path, EntryKind::Directory);
            let b = Entry::new(path, EntryKind::Directory);
            let action = Action::delete(a, b, "/src", "/dst", ActionDirection::SrcToDst).unwrap();
            tree.insert(action).unwrap();
        }
        let queue = build_queue(&tree);
        let sub_pos = queue.iter().position(|p| p == "dir/sub").unwrap();
        let dir_pos = queue.iter().position(|p| p == "dir").unwrap();
        assert!(sub_pos < dir_pos);
    }

    #[tokio::test]
    async fn abort_leaves_no_action_in_progress() {
        let mut tree = PlanTree::new("/src", "/dst");
        let a = Entry::new("a.txt", EntryKind::Regular);
        let b = Entry::missing("a.txt");
        let mut action = Action::copy(a, b, "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        action.status = SyncStatus::InProgress;
        tree.insert(action).unwrap();

        let engine: Arc<dyn TransferEngine> = Arc::new(LocalTransferEngine::new());
        let executor = Executor::new(engine, 4);
        executor.abort(&mut tree).await.unwrap();

        assert_ne!(tree.get("a.txt").unwrap().status, SyncStatus::InProgress);
    }
}
