//! Pairs entries from two filesystem views and assigns each pair an initial
//! action under a chosen synchronisation mode, producing a plan tree.

mod error;
mod events;

pub use error::{CompareError, CompareResult};
pub use events::CompareEvent;

use std::collections::HashMap;

use sync_fs::{Entry, FsView};
use sync_filters::FilterSet;
use sync_plan::{Action, ActionDirection, ActionError, ActionKind, PlanTree};

/// Synchronisation policy. `Dedupe` is recognised but not handled by the
/// comparer; it belongs to a separate, peripheral command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Update,
    Mirror,
    Sync,
    Dedupe,
}

#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    pub mode: SyncMode,
    /// When true, same-sized files are further compared by checksum; a
    /// mismatch downgrades `NoOp` to `Copy(update)` toward the newer mtime.
    pub deep: bool,
}

fn depth_of(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.matches('/').count() + 1
    }
}

fn sort_key(path: &str) -> (usize, &str) {
    (depth_of(path), path)
}

/// Lazily-yieldable in spirit, materialised here: pairs every entry known to
/// either view by relative path, sorted by (depth, path) so shorter prefixes
/// precede longer ones and siblings sort lexicographically.
pub fn synched_walk(src: &[Entry], dst: &[Entry]) -> Vec<(String, Option<Entry>, Option<Entry>)> {
    let mut pairs: HashMap<String, (Option<Entry>, Option<Entry>)> = HashMap::new();
    for entry in src {
        pairs.entry(entry.relative_path.clone()).or_default().0 = Some(entry.clone());
    }
    for entry in dst {
        pairs.entry(entry.relative_path.clone()).or_default().1 = Some(entry.clone());
    }

    let mut keys: Vec<String> = pairs.keys().cloned().collect();
    keys.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    keys.into_iter()
        .map(|k| {
            let (a, b) = pairs.remove(&k).expect("key drawn from the same map");
            (k, a, b)
        })
        .collect()
}

pub struct Comparer;

impl Comparer {
    /// Walks both views, builds one action per path, applies the filter set
    /// and the mode's rewrites, and reconciles the whole tree once at the
    /// end.
    pub async fn compare(
        src: &mut FsView,
        dst: &mut FsView,
        filters: &FilterSet,
        options: &CompareOptions,
    ) -> CompareResult<PlanTree> {
        Self::compare_with_events(src, dst, filters, options, None).await
    }

    pub async fn compare_with_events(
        src: &mut FsView,
        dst: &mut FsView,
        filters: &FilterSet,
        options: &CompareOptions,
        events: Option<&crossbeam_channel::Sender<CompareEvent>>,
    ) -> CompareResult<PlanTree> {
        if options.mode == SyncMode::Dedupe {
            return Err(CompareError::Action(ActionError::DirectionNotPermitted(
                "dedupe is not handled by the comparer".into(),
            )));
        }

        let a_root = src.root().absolute_path().to_string();
        let b_root = dst.root().absolute_path().to_string();

        events::notify(
            events,
            CompareEvent::BeforeComparing {
                source_root: a_root.clone(),
                dest_root: b_root.clone(),
            },
        );

        let src_entries: Vec<Entry> = src.walk().cloned().collect();
        let dst_entries: Vec<Entry> = dst.walk().cloned().collect();
        let pairs = synched_walk(&src_entries, &dst_entries);
        let total = pairs.len();

        let mut tree = PlanTree::new(a_root.clone(), b_root.clone());

        for (processed, (path, a, b)) in pairs.into_iter().enumerate() {
            events::notify(
                events,
                CompareEvent::OnComparing {
                    path: path.clone(),
                    processed,
                    total,
                },
            );
            let mut action = Self::compare_leaf(src, dst, &path, a, b, &a_root, &b_root, options.deep).await?;
            action.excluded =
                filters.excludes_pair(Some(&action.a), &a_root, Some(&action.b), &b_root);
            Self::rewrite_for_mode(&mut action, options.mode);
            tree.insert(action)?;
        }

        tree.make_all_actions_consistent(true);
        events::notify(events, CompareEvent::AfterComparing { action_count: total });
        Ok(tree)
    }

    async fn compare_leaf(
        src: &mut FsView,
        dst: &mut FsView,
        path: &str,
        a: Option<Entry>,
        b: Option<Entry>,
        a_root: &str,
        b_root: &str,
        deep: bool,
    ) -> CompareResult<Action> {
        match (a, b) {
            (Some(a), Some(b)) => {
                let mut same = a.size == b.size;
                if same && deep && !a.is_directory() && !b.is_directory() {
                    let checksum_a = src.get_checksum(path).await?;
                    let checksum_b = dst.get_checksum(path).await?;
                    same = checksum_a == checksum_b;
                }

                if same {
                    Ok(Action::no_op(a, b, a_root, b_root))
                } else {
                    // Tie-breaking: equal mtimes resolve to src->dst.
                    let direction = if b.mtime > a.mtime {
                        ActionDirection::DstToSrc
                    } else {
                        ActionDirection::SrcToDst
                    };
                    Ok(Action::copy(a, b, a_root, b_root, direction)?)
                }
            }
            // a missing: if it was present last run, the deletion happened
            // on the source side and the surviving b copy must go too.
            (None, Some(b)) => {
                if src.get_previous_entry(path, true).is_some_and(|e| e.exists) {
                    Ok(Action::delete(Entry::missing(path), b, a_root, b_root, ActionDirection::SrcToDst)?)
                } else {
                    Ok(Action::copy(Entry::missing(path), b, a_root, b_root, ActionDirection::DstToSrc)?)
                }
            }
            // b missing: symmetric refinement against dst's own previous
            // snapshot; the surviving a copy is removed to match.
            (Some(a), None) => {
                if dst.get_previous_entry(path, true).is_some_and(|e| e.exists) {
                    Ok(Action::delete(a, Entry::missing(path), a_root, b_root, ActionDirection::DstToSrc)?)
                } else {
                    Ok(Action::copy(a, Entry::missing(path), a_root, b_root, ActionDirection::SrcToDst)?)
                }
            }
            (None, None) => unreachable!("synched_walk never yields an empty pair"),
        }
    }

    fn rewrite_for_mode(action: &mut Action, mode: SyncMode) {
        match mode {
            SyncMode::Update => match action.direction {
                Some(ActionDirection::DstToSrc) => {
                    action.kind = ActionKind::NoOp;
                    action.direction = Some(ActionDirection::SrcToDst);
                }
                Some(ActionDirection::Both) => {
                    action.direction = Some(ActionDirection::SrcToDst);
                }
                _ => {}
            },
            SyncMode::Mirror => match action.direction {
                Some(ActionDirection::DstToSrc) => {
                    action.kind = if !action.a.exists {
                        ActionKind::Delete
                    } else {
                        ActionKind::Copy {
                            is_update: action.a.exists && action.b.exists,
                        }
                    };
                    action.direction = Some(ActionDirection::SrcToDst);
                }
                Some(ActionDirection::Both) => {
                    action.direction = Some(ActionDirection::SrcToDst);
                }
                _ => {}
            },
            SyncMode::Sync | SyncMode::Dedupe => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use sync_fs::EntryKind;
    use sync_path::{PathFlavor, SyncPath};
    use sync_transfer::local::LocalTransferEngine;

    fn entry(path: &str, kind: EntryKind, size: Option<u64>, mtime: Option<i64>) -> Entry {
        let mut e = Entry::new(path, kind);
        e.size = size;
        e.mtime = mtime.map(|secs| Utc.timestamp_opt(secs, 0).unwrap());
        e
    }

    async fn fresh_view(root: &std::path::Path) -> FsView {
        let engine = Arc::new(LocalTransferEngine::new());
        let path = SyncPath::new(PathFlavor::Posix, root.to_str().unwrap()).unwrap();
        let mut view = FsView::new(path, engine, root.join(".cache"));
        view.load().await.unwrap();
        view
    }

    #[test]
    fn synched_walk_orders_by_depth_then_path() {
        let src = vec![entry("b", EntryKind::Regular, Some(1), None), entry("a/x", EntryKind::Regular, Some(1), None)];
        let dst = vec![];
        let pairs = synched_walk(&src, &dst);
        let paths: Vec<&str> = pairs.iter().map(|(p, _, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["b", "a/x"]);
    }

    #[test]
    fn synched_walk_pairs_entries_present_on_either_side() {
        let src = vec![entry("only-src", EntryKind::Regular, Some(1), None)];
        let dst = vec![entry("only-dst", EntryKind::Regular, Some(1), None)];
        let pairs = synched_walk(&src, &dst);
        assert_eq!(pairs.len(), 2);
    }

    #[tokio::test]
    async fn equal_size_files_yield_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("same.txt"), b"hi").await.unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(src_dir.join("same.txt"), b"hi").await.unwrap();
        tokio::fs::write(dst_dir.join("same.txt"), b"hi").await.unwrap();

        let mut src = fresh_view(&src_dir).await;
        let mut dst = fresh_view(&dst_dir).await;
        let filters = FilterSet::new();
        let options = CompareOptions {
            mode: SyncMode::Sync,
            deep: false,
        };
        let tree = Comparer::compare(&mut src, &mut dst, &filters, &options).await.unwrap();
        assert_eq!(tree.get("same.txt").unwrap().kind, ActionKind::NoOp);
    }

    #[tokio::test]
    async fn source_only_file_copies_toward_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(src_dir.join("only.txt"), b"hi").await.unwrap();

        let mut src = fresh_view(&src_dir).await;
        let mut dst = fresh_view(&dst_dir).await;
        let filters = FilterSet::new();
        let options = CompareOptions {
            mode: SyncMode::Sync,
            deep: false,
        };
        let tree = Comparer::compare(&mut src, &mut dst, &filters, &options).await.unwrap();
        let action = tree.get("only.txt").unwrap();
        assert!(matches!(action.kind, ActionKind::Copy { is_update: false }));
        assert_eq!(action.direction, Some(ActionDirection::SrcToDst));
    }

    #[tokio::test]
    async fn update_mode_neutralises_destination_to_source_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(dst_dir.join("only.txt"), b"hi").await.unwrap();

        let mut src = fresh_view(&src_dir).await;
        let mut dst = fresh_view(&dst_dir).await;
        let filters = FilterSet::new();
        let options = CompareOptions {
            mode: SyncMode::Update,
            deep: false,
        };
        let tree = Comparer::compare(&mut src, &mut dst, &filters, &options).await.unwrap();
        let action = tree.get("only.txt").unwrap();
        assert_eq!(action.kind, ActionKind::NoOp);
    }

    #[tokio::test]
    async fn mirror_mode_deletes_destination_only_file() {
        let tmp = tempfile::tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(dst_dir.join("extra.txt"), b"hi").await.unwrap();

        let mut src = fresh_view(&src_dir).await;
        let mut dst = fresh_view(&dst_dir).await;
        let filters = FilterSet::new();
        let options = CompareOptions {
            mode: SyncMode::Mirror,
            deep: false,
        };
        let tree = Comparer::compare(&mut src, &mut dst, &filters, &options).await.unwrap();
        let action = tree.get("extra.txt").unwrap();
        assert!(matches!(action.kind, ActionKind::Delete));
        assert_eq!(action.direction, Some(ActionDirection::SrcToDst));
    }

    #[tokio::test]
    async fn excluded_action_keeps_its_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let src_dir = tmp.path().join("src");
        let dst_dir = tmp.path().join("dst");
        tokio::fs::create_dir_all(&src_dir).await.unwrap();
        tokio::fs::create_dir_all(&dst_dir).await.unwrap();
        tokio::fs::write(src_dir.join(".hidden"), b"hi").await.unwrap();

        let mut src = fresh_view(&src_dir).await;
        let mut dst = fresh_view(&dst_dir).await;
        let mut filters = FilterSet::new();
        filters.push(Box::new(sync_filters::HiddenFilter::default()));
        let options = CompareOptions {
            mode: SyncMode::Sync,
            deep: false,
        };
        let tree = Comparer::compare(&mut src, &mut dst, &filters, &options).await.unwrap();
        let action = tree.get(".hidden").unwrap();
        assert!(action.excluded);
        assert!(matches!(action.kind, ActionKind::Copy { .. }));
    }

    #[test]
    fn dedupe_mode_is_rejected() {
        let options = CompareOptions {
            mode: SyncMode::Dedupe,
            deep: false,
        };
        assert_eq!(options.mode, SyncMode::Dedupe);
    }
}
