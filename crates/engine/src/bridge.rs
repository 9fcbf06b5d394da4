use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::segment::{Segment, SegmentSet};
use crate::span::SpanId;

/// Segment mutations the editor publishes to the waveform store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoreAction {
    /// Makes `segment_id` the only draggable segment.
    ActivateSegment { segment_id: SpanId },
    /// Live bounds while the form is being typed into.
    UpdateSegment { segment: Segment },
    /// Restores the pre-edit segment and leaves it non-editable.
    RevertSegment { segment: Segment },
    /// Final committed bounds, non-editable.
    SaveSegment { segment: Segment },
}

/// Dispatch surface the editor writes to. Fire-and-forget.
pub trait StoreBridge {
    fn dispatch(&mut self, action: StoreAction);
}

impl<B> StoreBridge for &mut B
where
    B: StoreBridge + ?Sized,
{
    fn dispatch(&mut self, action: StoreAction) {
        (**self).dispatch(action);
    }
}

/// In-process segment store.
///
/// Applies each action to its [`SegmentSet`] and then forwards it to every
/// live subscriber. Subscribers whose receiver was dropped are pruned.
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: SegmentSet,
    subscribers: Vec<Sender<StoreAction>>,
}

impl SegmentStore {
    pub fn new(segments: SegmentSet) -> Self {
        Self {
            segments,
            subscribers: Vec::new(),
        }
    }

    pub fn segments(&self) -> &SegmentSet {
        &self.segments
    }

    /// Registers a subscriber; it receives every action dispatched from now on.
    pub fn subscribe(&mut self) -> Receiver<StoreAction> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn reduce(&mut self, action: &StoreAction) {
        match action {
            StoreAction::ActivateSegment { segment_id } => {
                if let Err(error) = self.segments.activate(segment_id) {
                    warn!(%error, "activate action ignored");
                }
            }
            StoreAction::UpdateSegment { segment }
            | StoreAction::RevertSegment { segment }
            | StoreAction::SaveSegment { segment } => self.segments.upsert(segment.clone()),
        }
    }
}

impl StoreBridge for SegmentStore {
    fn dispatch(&mut self, action: StoreAction) {
        debug!(?action, subscribers = self.subscribers.len(), "store dispatch");
        self.reduce(&action);
        self.subscribers
            .retain(|subscriber| subscriber.send(action.clone()).is_ok());
    }
}

/// Receives all currently queued actions without blocking.
pub fn drain_actions(receiver: &Receiver<StoreAction>) -> Vec<StoreAction> {
    let mut actions = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(action) => actions.push(action),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SegmentStore, StoreAction, StoreBridge, drain_actions};
    use crate::segment::{Segment, SegmentSet};
    use crate::span::Span;

    fn store() -> SegmentStore {
        SegmentStore::new(SegmentSet::from_spans(&[
            Span {
                id: "a".to_string(),
                title: "A".to_string(),
                start_time: 0.0,
                end_time: 10.0,
            },
            Span {
                id: "b".to_string(),
                title: "B".to_string(),
                start_time: 10.0,
                end_time: 20.0,
            },
        ]))
    }

    #[test]
    fn dispatch_reaches_every_subscriber() {
        let mut store = store();
        let first = store.subscribe();
        let second = store.subscribe();

        store.dispatch(StoreAction::ActivateSegment {
            segment_id: "a".to_string(),
        });

        let expected = vec![StoreAction::ActivateSegment {
            segment_id: "a".to_string(),
        }];
        assert_eq!(drain_actions(&first), expected);
        assert_eq!(drain_actions(&second), expected);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut store = store();
        let kept = store.subscribe();
        drop(store.subscribe());

        store.dispatch(StoreAction::ActivateSegment {
            segment_id: "b".to_string(),
        });

        assert_eq!(store.subscribers.len(), 1);
        assert_eq!(drain_actions(&kept).len(), 1);
    }

    #[test]
    fn revert_restores_bounds_and_clears_editable() {
        let mut store = store();
        store.dispatch(StoreAction::ActivateSegment {
            segment_id: "b".to_string(),
        });
        store.dispatch(StoreAction::UpdateSegment {
            segment: Segment {
                id: "b".to_string(),
                start_time: 12.0,
                end_time: 18.0,
                editable: true,
            },
        });

        store.dispatch(StoreAction::RevertSegment {
            segment: Segment {
                id: "b".to_string(),
                start_time: 10.0,
                end_time: 20.0,
                editable: false,
            },
        });

        let reverted = store.segments().get("b").expect("b exists");
        assert_eq!((reverted.start_time, reverted.end_time), (10.0, 20.0));
        assert!(store.segments().active().is_none());
    }

    #[test]
    fn activate_of_unknown_segment_is_ignored() {
        let mut store = store();
        store.dispatch(StoreAction::ActivateSegment {
            segment_id: "a".to_string(),
        });

        store.dispatch(StoreAction::ActivateSegment {
            segment_id: "nope".to_string(),
        });

        assert_eq!(
            store.segments().active().map(|segment| segment.id.as_str()),
            Some("a")
        );
    }
}
