/// Progress notifications emitted by [`crate::Executor`]. Delivery is
/// informational: a dropped receiver must not affect synching correctness.
#[derive(Debug, Clone)]
pub enum SynchEvent {
    BeforeSynching,
    OnSynching { active: Vec<String> },
    AfterSynching,
}

pub(crate) fn notify(sink: Option<&crossbeam_channel::Sender<SynchEvent>>, event: SynchEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event);
    }
}
