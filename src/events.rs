// src/events.rs
//
// Change notifications for renderers and playback cursors. Every subscriber
// gets its own unbounded channel; a dropped receiver is pruned on the next send.

use crate::time::Time;
use crate::timeline::{ClipId, TrackId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrimEdge {
    Left,
    Right,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDirection {
    Undo,
    Redo,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineEvent {
    ClipAdded { track_id: TrackId, clip_id: ClipId },
    ClipMoved { clip_id: ClipId, from: Time, to: Time },
    ClipRelocated { clip_id: ClipId, from_track: TrackId, to_track: TrackId },
    ClipTrimmed { clip_id: ClipId, edge: TrimEdge },
    ClipSplit { original: ClipId, created: ClipId },
    ClipDeleted { track_id: TrackId, clip_id: ClipId, ripple_delta: Option<Time> },
    ClipUpdated { clip_id: ClipId },
    TrackAdded { track_id: TrackId },
    TrackRemoved { track_id: TrackId },
    TrackReordered { track_id: TrackId, from: usize, to: usize },
    TrackUpdated { track_id: TrackId },
    DurationChanged { duration: Time },
    SelectionChanged { clip_id: Option<ClipId> },
    PlayheadMoved { position: Time },
    MarkersChanged,
    /// Followed by the entity events of the reverted or replayed edit.
    HistoryApplied { label: String, direction: HistoryDirection },
    /// The whole timeline was rolled back to a checkpoint; redraw everything.
    StateRestored,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<TimelineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: TimelineEvent) {
        log::trace!("[events] {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = TimelineEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(TimelineEvent::MarkersChanged);
        assert_eq!(a.try_recv().unwrap(), TimelineEvent::MarkersChanged);
        assert_eq!(b.try_recv().unwrap(), TimelineEvent::MarkersChanged);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        bus.emit(TimelineEvent::PlayheadMoved { position: Time::from_whole_secs(1) });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = TimelineEvent::DurationChanged { duration: Time::from_whole_secs(7) };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"DURATION_CHANGED","duration":7000000}"#);
    }
}
