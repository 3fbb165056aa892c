use sync_fs::Entry;
use sync_transfer::{EngineError, JobHandle, JobState, TransferEngine};

use crate::error::{ActionError, ActionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDirection {
    SrcToDst,
    DstToSrc,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

/// The variant-specific behaviour and immutable discriminants of an action.
/// Shared state (`a`, `b`, `status`, `excluded`, `job_handle`) lives on
/// [`Action`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    NoOp,
    Copy { is_update: bool },
    Delete,
}

impl ActionKind {
    fn supports_both(&self) -> bool {
        matches!(self, ActionKind::Delete)
    }

    pub fn status_glyph(&self) -> &'static str {
        match self {
            ActionKind::NoOp => "-",
            ActionKind::Copy { is_update: true } => "+",
            ActionKind::Copy { is_update: false } => "*",
            ActionKind::Delete => "x",
        }
    }
}

/// A per-path instruction: `NoOp | Copy | Delete`, with shared execution
/// state. `a` is the source-side entry, `b` the destination-side entry.
#[derive(Debug, Clone)]
pub struct Action {
    pub a: Entry,
    pub b: Entry,
    /// Root of the filesystem view `a` belongs to.
    pub a_root: String,
    /// Root of the filesystem view `b` belongs to.
    pub b_root: String,
    pub kind: ActionKind,
    pub direction: Option<ActionDirection>,
    pub excluded: bool,
    pub status: SyncStatus,
    pub job_handle: Option<JobHandle>,
    pub last_error: Option<String>,
}

fn validate_direction(kind: ActionKind, a: &Entry, b: &Entry, direction: Option<ActionDirection>) -> ActionResult<()> {
    match (kind, direction) {
        (ActionKind::NoOp, _) => Ok(()),
        (ActionKind::Copy { .. }, Some(ActionDirection::SrcToDst)) if !a.exists => Err(
            ActionError::DirectionNotPermitted("source-to-destination copy requires the source to exist".into()),
        ),
        (ActionKind::Copy { .. }, Some(ActionDirection::DstToSrc)) if !b.exists => Err(
            ActionError::DirectionNotPermitted("destination-to-source copy requires the destination to exist".into()),
        ),
        (ActionKind::Copy { .. }, Some(ActionDirection::Both)) => Err(ActionError::DirectionNotPermitted(
            "copy actions do not support bidirectional execution".into(),
        )),
        (ActionKind::Copy { .. }, None) => Err(ActionError::DirectionNotPermitted(
            "copy actions require a direction".into(),
        )),
        (ActionKind::Delete, Some(ActionDirection::SrcToDst)) if !b.exists => Err(ActionError::DirectionNotPermitted(
            "source-to-destination delete requires the destination to exist".into(),
        )),
        (ActionKind::Delete, Some(ActionDirection::DstToSrc)) if !a.exists => Err(ActionError::DirectionNotPermitted(
            "destination-to-source delete requires the source to exist".into(),
        )),
        (ActionKind::Delete, Some(ActionDirection::Both)) if !a.exists || !b.exists => Err(
            ActionError::DirectionNotPermitted("bidirectional delete requires both sides to exist".into()),
        ),
        (ActionKind::Delete, None) => Err(ActionError::DirectionNotPermitted(
            "delete actions require a direction".into(),
        )),
        _ => Ok(()),
    }
}

impl Action {
    pub fn no_op(a: Entry, b: Entry, a_root: impl Into<String>, b_root: impl Into<String>) -> Self {
        Action {
            a,
            b,
            a_root: a_root.into(),
            b_root: b_root.into(),
            kind: ActionKind::NoOp,
            direction: None,
            excluded: false,
            status: SyncStatus::NotStarted,
            job_handle: None,
            last_error: None,
        }
    }

    /// `is_update = a.exists ∧ b.exists` at construction; otherwise the copy
    /// is fresh.
    pub fn copy(
        a: Entry,
        b: Entry,
        a_root: impl Into<String>,
        b_root: impl Into<String>,
        direction: ActionDirection,
    ) -> ActionResult<Self> {
        let is_update = a.exists && b.exists;
        let kind = ActionKind::Copy { is_update };
        validate_direction(kind, &a, &b, Some(direction))?;
        Ok(Action {
            a,
            b,
            a_root: a_root.into(),
            b_root: b_root.into(),
            kind,
            direction: Some(direction),
            excluded: false,
            status: SyncStatus::NotStarted,
            job_handle: None,
            last_error: None,
        })
    }

    pub fn delete(
        a: Entry,
        b: Entry,
        a_root: impl Into<String>,
        b_root: impl Into<String>,
        direction: ActionDirection,
    ) -> ActionResult<Self> {
        validate_direction(ActionKind::Delete, &a, &b, Some(direction))?;
        Ok(Action {
            a,
            b,
            a_root: a_root.into(),
            b_root: b_root.into(),
            kind: ActionKind::Delete,
            direction: Some(direction),
            excluded: false,
            status: SyncStatus::NotStarted,
            job_handle: None,
            last_error: None,
        })
    }

    pub fn is_folder(&self) -> bool {
        self.a.is_directory() || self.b.is_directory()
    }

    pub fn is_update(&self) -> bool {
        matches!(self.kind, ActionKind::Copy { is_update: true })
    }

    /// Flips between `src→dst` and `dst→src`; fails if the new direction's
    /// required side does not exist.
    pub fn swap_direction(&mut self) -> ActionResult<()> {
        if matches!(self.kind, ActionKind::NoOp) {
            return Ok(());
        }
        let current = self
            .direction
            .ok_or_else(|| ActionError::DirectionNotPermitted("action has no direction to swap".into()))?;
        let new_dir = match current {
            ActionDirection::SrcToDst => ActionDirection::DstToSrc,
            ActionDirection::DstToSrc => ActionDirection::SrcToDst,
            ActionDirection::Both => ActionDirection::SrcToDst,
        };

        let required_side_exists = match (self.kind, new_dir) {
            (ActionKind::Copy { .. }, ActionDirection::SrcToDst) => self.a.exists,
            (ActionKind::Copy { .. }, ActionDirection::DstToSrc) => self.b.exists,
            (ActionKind::Delete, ActionDirection::SrcToDst) => self.b.exists,
            (ActionKind::Delete, ActionDirection::DstToSrc) => self.a.exists,
            _ => true,
        };

        if !required_side_exists {
            return Err(ActionError::DirectionNotPermitted(
                "action swap not possible: the required side does not exist".into(),
            ));
        }

        self.direction = Some(new_dir);
        Ok(())
    }

    /// Sets `direction=both`; permitted only on `Delete`; requires both
    /// sides to exist.
    pub fn apply_both_sides(&mut self) -> ActionResult<()> {
        if matches!(self.kind, ActionKind::NoOp) {
            return Ok(());
        }
        if !self.kind.supports_both() {
            return Err(ActionError::DirectionNotPermitted(
                "this action does not support bidirectional changes".into(),
            ));
        }
        if !self.a.exists || !self.b.exists {
            return Err(ActionError::DirectionNotPermitted(
                "both sides must exist to apply bidirectionally".into(),
            ));
        }
        self.direction = Some(ActionDirection::Both);
        Ok(())
    }

    /// Initiates execution. `NoOp` is a no-op; an excluded or already
    /// in-flight action is also a no-op.
    pub async fn apply(&mut self, engine: &dyn TransferEngine) -> ActionResult<()> {
        if self.excluded || self.job_handle.is_some() {
            return Ok(());
        }

        match self.kind {
            ActionKind::NoOp => {}
            ActionKind::Copy { .. } => {
                if self.is_folder() {
                    self.status = SyncStatus::Success;
                    return Ok(());
                }
                let (src_root, src_rel, dst_root, dst_rel) = match self.direction {
                    Some(ActionDirection::DstToSrc) => (
                        self.b_root.clone(),
                        self.b.relative_path.clone(),
                        self.a_root.clone(),
                        self.a.relative_path.clone(),
                    ),
                    _ => (
                        self.a_root.clone(),
                        self.a.relative_path.clone(),
                        self.b_root.clone(),
                        self.b.relative_path.clone(),
                    ),
                };
                match engine.copy_file(&src_root, &src_rel, &dst_root, &dst_rel).await {
                    Ok(handle) => {
                        self.job_handle = Some(handle);
                        self.status = SyncStatus::InProgress;
                    }
                    Err(e) => self.fail(e),
                }
            }
            ActionKind::Delete => {
                let both_dirs = self.a.is_directory() && self.b.is_directory();
                let direction = self.direction;

                if matches!(direction, Some(ActionDirection::SrcToDst) | Some(ActionDirection::Both)) {
                    let result = if both_dirs {
                        engine.rmdir(&self.b_root, &self.b.relative_path).await
                    } else {
                        engine.delete_file(&self.b_root, &self.b.relative_path).await
                    };
                    if let Err(e) = result {
                        self.fail(e);
                        return Ok(());
                    }
                }
                if matches!(direction, Some(ActionDirection::DstToSrc) | Some(ActionDirection::Both)) {
                    let result = if both_dirs {
                        engine.rmdir(&self.a_root, &self.a.relative_path).await
                    } else {
                        engine.delete_file(&self.a_root, &self.a.relative_path).await
                    };
                    if let Err(e) = result {
                        self.fail(e);
                        return Ok(());
                    }
                }
                self.status = SyncStatus::InProgress;
            }
        }
        Ok(())
    }

    fn fail(&mut self, error: EngineError) {
        self.status = SyncStatus::Failed;
        self.last_error = Some(error.to_string());
    }

    /// Reconciles local state with the engine's view of the job, if any.
    pub async fn update_status(&mut self, engine: &dyn TransferEngine) -> ActionResult<()> {
        if self.excluded || matches!(self.status, SyncStatus::Success | SyncStatus::Failed) {
            return Ok(());
        }

        match self.kind {
            ActionKind::NoOp => self.status = SyncStatus::Success,
            ActionKind::Copy { .. } => {
                if self.is_folder() {
                    self.status = SyncStatus::Success;
                    return Ok(());
                }
                let Some(handle) = self.job_handle else {
                    return Ok(());
                };
                let jobs = engine.jobs().await.map_err(ActionError::Engine)?;
                if let Some((_, state)) = jobs.into_iter().find(|(h, _)| *h == handle) {
                    self.status = match state {
                        JobState::NotStarted => SyncStatus::NotStarted,
                        JobState::InProgress => SyncStatus::InProgress,
                        JobState::Finished => SyncStatus::Success,
                        JobState::Failed => SyncStatus::Failed,
                    };
                }
            }
            ActionKind::Delete => {
                let mut dst_gone = true;
                let mut src_gone = true;
                if matches!(self.direction, Some(ActionDirection::SrcToDst) | Some(ActionDirection::Both)) {
                    dst_gone = !engine
                        .exists(&self.b_root, &self.b.relative_path)
                        .await
                        .map_err(ActionError::Engine)?;
                }
                if matches!(self.direction, Some(ActionDirection::DstToSrc) | Some(ActionDirection::Both)) {
                    src_gone = !engine
                        .exists(&self.a_root, &self.a.relative_path)
                        .await
                        .map_err(ActionError::Engine)?;
                }
                self.status = if dst_gone && src_gone {
                    SyncStatus::Success
                } else {
                    SyncStatus::Failed
                };
            }
        }
        Ok(())
    }

    /// Only legal when `status=failed`; resets `status` and job handle.
    pub fn retry(&mut self) -> ActionResult<()> {
        if self.status != SyncStatus::Failed {
            return Err(ActionError::InvalidRetry);
        }
        self.status = SyncStatus::NotStarted;
        self.job_handle = None;
        self.last_error = None;
        Ok(())
    }

    /// Textual status indicator, prefixed by the direction arrow.
    pub fn status_indicator(&self) -> String {
        let arrow = match self.direction {
            Some(ActionDirection::SrcToDst) => ">",
            Some(ActionDirection::DstToSrc) => "<",
            Some(ActionDirection::Both) => "<>",
            None => "",
        };
        format!("{arrow}{}", self.kind.status_glyph())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_fs::EntryKind;
    use sync_transfer::local::LocalTransferEngine;

    fn existing(path: &str) -> Entry {
        Entry::new(path, EntryKind::Regular)
    }
    fn missing(path: &str) -> Entry {
        Entry::missing(path)
    }

    #[test]
    fn copy_src_to_dst_requires_source_to_exist() {
        let err = Action::copy(missing("a"), existing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap_err();
        assert!(matches!(err, ActionError::DirectionNotPermitted(_)));
    }

    #[test]
    fn copy_is_update_when_both_sides_exist() {
        let action = Action::copy(existing("a"), existing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert!(action.is_update());
    }

    #[test]
    fn copy_is_fresh_when_destination_missing() {
        let action = Action::copy(existing("a"), missing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert!(!action.is_update());
    }

    #[test]
    fn delete_both_requires_both_sides_present() {
        let err = Action::delete(existing("a"), missing("b"), "/src", "/dst", ActionDirection::Both).unwrap_err();
        assert!(matches!(err, ActionError::DirectionNotPermitted(_)));
    }

    #[test]
    fn swap_direction_fails_when_target_side_absent() {
        let mut action = Action::copy(existing("a"), missing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        let err = action.swap_direction().unwrap_err();
        assert!(matches!(err, ActionError::DirectionNotPermitted(_)));
    }

    #[test]
    fn apply_both_sides_rejected_on_copy() {
        let mut action = Action::copy(existing("a"), existing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert!(action.apply_both_sides().is_err());
    }

    #[test]
    fn retry_only_legal_when_failed() {
        let mut action = Action::copy(existing("a"), missing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert!(matches!(action.retry(), Err(ActionError::InvalidRetry)));
        action.status = SyncStatus::Failed;
        assert!(action.retry().is_ok());
        assert_eq!(action.status, SyncStatus::NotStarted);
    }

    #[tokio::test]
    async fn applying_copy_between_two_directories_is_immediate_success() {
        let a = Entry::new("dir", EntryKind::Directory);
        let b = Entry::missing("dir");
        let mut action = Action::copy(a, b, "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        let engine = LocalTransferEngine::new();
        action.apply(&engine).await.unwrap();
        assert_eq!(action.status, SyncStatus::Success);
    }

    #[test]
    fn status_indicator_matches_glyph_table() {
        let no_op = Action::no_op(existing("a"), existing("b"), "/src", "/dst");
        assert_eq!(no_op.status_indicator(), "-");
        let fresh = Action::copy(existing("a"), missing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert_eq!(fresh.status_indicator(), ">*");
        let update = Action::copy(existing("a"), existing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert_eq!(update.status_indicator(), ">+");
        let del = Action::delete(existing("a"), existing("b"), "/src", "/dst", ActionDirection::SrcToDst).unwrap();
        assert_eq!(del.status_indicator(), ">x");
    }
}
