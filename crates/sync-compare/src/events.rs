/// Progress notifications emitted by [`crate::Comparer::compare`]. Delivery
/// is informational: a dropped receiver must not affect the comparison.
#[derive(Debug, Clone)]
pub enum CompareEvent {
    BeforeComparing { source_root: String, dest_root: String },
    OnComparing { path: String, processed: usize, total: usize },
    AfterComparing { action_count: usize },
}

pub(crate) fn notify(sink: Option<&crossbeam_channel::Sender<CompareEvent>>, event: CompareEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}
