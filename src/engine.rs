// src/engine.rs
use crate::error::{EditError, EditResult};
use crate::events::{EventBus, HistoryDirection, TimelineEvent};
use crate::history::{CommandLog, EditCommand, HistoryEntry, Transport};
use crate::preferences::EditorPreferences;
use crate::time::Time;
use crate::timeline::{Clip, ClipId, TimelineState, Track, TrackId, DURATION_PADDING};
use crossbeam_channel::Receiver;

/// How the timeline duration reacts to a commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum DurationRule {
    /// Grow by padding when `end` runs past the current duration.
    Extend { end: Time },
    /// Derive from the clips.
    Recompute,
    /// No clip end can have changed.
    Keep,
}

pub struct Checkpoint {
    state: TimelineState,
    history: CommandLog,
}

/// Owns the live timeline, its command log and its subscribers. Single
/// threaded: every call completes before returning.
pub struct TimelineEngine {
    pub(crate) state: TimelineState,
    pub(crate) history: CommandLog,
    pub(crate) events: EventBus,
}

impl Default for TimelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineEngine {
    pub fn new() -> Self {
        Self::from_state(TimelineState::default())
    }

    /// Wraps an existing (e.g. freshly loaded) state with an empty history.
    pub fn from_state(state: TimelineState) -> Self {
        Self {
            state,
            history: CommandLog::new(),
            events: EventBus::new(),
        }
    }

    pub fn with_preferences(prefs: &EditorPreferences) -> Self {
        let mut engine = Self::new();
        engine.apply_preferences(prefs);
        engine
    }

    /// Copies the session policy out of `prefs`; preferences were validated on load.
    pub fn apply_preferences(&mut self, prefs: &EditorPreferences) {
        self.state.snap_enabled = prefs.snap_enabled;
        if let Some(grid) = prefs.grid_time() {
            self.state.grid_interval = grid;
        }
        self.state.ripple_edit_enabled = prefs.ripple_edit_enabled;
        self.history.set_limit(prefs.history_limit);
    }

    // --- QUERIES ---

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn tracks(&self) -> &[Track] {
        &self.state.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.state.track(id)
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.state.clip(id)
    }

    pub fn track_of(&self, id: ClipId) -> Option<&Track> {
        self.state.track_of(id)
    }

    pub fn duration(&self) -> Time {
        self.state.duration
    }

    pub fn playhead(&self) -> Time {
        self.state.playhead
    }

    pub fn selected_clip(&self) -> Option<ClipId> {
        self.state.selected_clip
    }

    /// Clip under `time` on the topmost visible track that has one.
    pub fn clip_at(&self, time: Time) -> Option<ClipId> {
        self.state
            .tracks
            .iter()
            .filter(|t| !t.flags.hidden)
            .find_map(|t| t.clips.iter().find(|c| c.contains(time)))
            .map(|c| c.id)
    }

    pub fn clip_at_on_track(&self, track_id: TrackId, time: Time) -> EditResult<Option<ClipId>> {
        let track = self
            .state
            .track(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        Ok(track.clips.iter().find(|c| c.contains(time)).map(|c| c.id))
    }

    /// Clips on the track intersecting `[t0, t1)`, in time order.
    pub fn clips_in_range(&self, track_id: TrackId, t0: Time, t1: Time) -> EditResult<Vec<ClipId>> {
        if t1 < t0 {
            return Err(EditError::InvalidArgument(format!(
                "range end {t1} precedes start {t0}"
            )));
        }
        let track = self
            .state
            .track(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        if t0 == t1 {
            return Ok(Vec::new());
        }
        Ok(track
            .clips
            .iter()
            .filter(|c| c.overlaps(t0, t1))
            .map(|c| c.id)
            .collect())
    }

    // --- NOTIFICATIONS ---

    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        self.events.subscribe()
    }

    // --- HISTORY ---

    pub fn history(&self) -> &CommandLog {
        &self.history
    }

    pub fn undo_len(&self) -> usize {
        self.history.undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.history.redo_len()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    /// Reverts the newest entry. Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let before = Transport::capture(&self.state);
        let (label, replayed) = match self.history.undo(&mut self.state) {
            Some(entry) => (
                entry.label.clone(),
                entry.command.replay_events(HistoryDirection::Undo, &self.state),
            ),
            None => return false,
        };
        self.announce_history(label, HistoryDirection::Undo, replayed, before);
        true
    }

    /// Re-applies the newest undone entry. Returns false when there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let before = Transport::capture(&self.state);
        let (label, replayed) = match self.history.redo(&mut self.state) {
            Some(entry) => (
                entry.label.clone(),
                entry.command.replay_events(HistoryDirection::Redo, &self.state),
            ),
            None => return false,
        };
        self.announce_history(label, HistoryDirection::Redo, replayed, before);
        true
    }

    fn announce_history(
        &mut self,
        label: String,
        direction: HistoryDirection,
        replayed: Vec<TimelineEvent>,
        before: Transport,
    ) {
        self.check_integrity();
        self.events.emit(TimelineEvent::HistoryApplied { label, direction });
        self.events.emit_all(replayed);
        self.announce_transport(before);
    }

    /// Snapshot of the timeline and its history, for all-or-nothing batches.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            history: self.history.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        let before = Transport::capture(&self.state);
        self.state = checkpoint.state;
        self.history = checkpoint.history;
        self.check_integrity();
        log::info!("[engine] restored checkpoint");
        self.events.emit(TimelineEvent::StateRestored);
        self.announce_transport(before);
    }

    // --- TRANSPORT & POLICY ---

    /// Moves the playhead, clamped to `[0, duration]`. Returns where it landed.
    pub fn set_playhead(&mut self, time: Time) -> Time {
        let previous = self.state.playhead;
        self.state.playhead = time;
        self.state.clamp_playhead();
        if self.state.playhead != previous {
            self.events.emit(TimelineEvent::PlayheadMoved {
                position: self.state.playhead,
            });
        }
        self.state.playhead
    }

    pub fn select_clip(&mut self, id: Option<ClipId>) -> EditResult<()> {
        if let Some(id) = id {
            if self.state.clip(id).is_none() {
                return Err(EditError::ClipNotFound(id));
            }
        }
        if self.state.selected_clip != id {
            self.state.set_selection(id);
            self.events.emit(TimelineEvent::SelectionChanged { clip_id: id });
        }
        Ok(())
    }

    pub fn set_in_out(&mut self, in_point: Option<Time>, out_point: Option<Time>) -> EditResult<()> {
        let (in_point, out_point) = validate_markers(in_point, out_point, "in/out")?;
        self.state.in_point = in_point;
        self.state.out_point = out_point;
        self.events.emit(TimelineEvent::MarkersChanged);
        Ok(())
    }

    pub fn set_loop(&mut self, start: Option<Time>, end: Option<Time>) -> EditResult<()> {
        let (start, end) = validate_markers(start, end, "loop")?;
        self.state.loop_start = start;
        self.state.loop_end = end;
        self.events.emit(TimelineEvent::MarkersChanged);
        Ok(())
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.state.snap_enabled = enabled;
    }

    pub fn set_grid_interval(&mut self, interval: Time) -> EditResult<()> {
        if !interval.is_positive() {
            return Err(EditError::InvalidConfiguration(format!(
                "grid interval must be positive, got {interval}"
            )));
        }
        self.state.grid_interval = interval;
        Ok(())
    }

    pub fn set_ripple_edit(&mut self, enabled: bool) {
        self.state.ripple_edit_enabled = enabled;
    }

    // --- COMMIT ---

    /// Applies an already validated command, settles duration and playhead,
    /// records the entry and notifies subscribers.
    pub(crate) fn commit(
        &mut self,
        command: EditCommand,
        rule: DurationRule,
        events: Vec<TimelineEvent>,
    ) -> EditResult<()> {
        let before = Transport::capture(&self.state);
        command.apply(&mut self.state)?;

        // A clip that is gone cannot stay selected.
        if let Some(selected) = self.state.selected_clip {
            if self.state.clip(selected).is_none() {
                self.state.set_selection(None);
            }
        }
        self.state.duration = match rule {
            DurationRule::Extend { end } if end > self.state.duration => {
                end + DURATION_PADDING
            }
            DurationRule::Extend { .. } => self.state.duration,
            DurationRule::Recompute => self.state.content_duration(),
            DurationRule::Keep => self.state.duration,
        };
        self.state.clamp_playhead();

        let after = Transport::capture(&self.state);
        log::debug!(
            "[engine] {} ({} clips, {})",
            command.label(),
            self.state.clip_count(),
            self.state.duration
        );
        self.history.push(HistoryEntry::new(command, before, after));
        self.check_integrity();

        self.events.emit_all(events);
        self.announce_transport(before);
        Ok(())
    }

    fn announce_transport(&mut self, before: Transport) {
        let after = Transport::capture(&self.state);
        if after.duration != before.duration {
            self.events.emit(TimelineEvent::DurationChanged {
                duration: after.duration,
            });
        }
        if after.selected_clip != before.selected_clip {
            self.events.emit(TimelineEvent::SelectionChanged {
                clip_id: after.selected_clip,
            });
        }
        if after.playhead != before.playhead {
            self.events.emit(TimelineEvent::PlayheadMoved {
                position: after.playhead,
            });
        }
    }

    fn check_integrity(&self) {
        let report = self.state.verify_integrity();
        debug_assert!(report.is_ok(), "timeline integrity violated: {report:?}");
        if let Err(err) = report {
            log::error!("[engine] integrity violated: {err}");
        }
    }
}

fn validate_markers(
    start: Option<Time>,
    end: Option<Time>,
    what: &str,
) -> EditResult<(Option<Time>, Option<Time>)> {
    for value in [start, end].into_iter().flatten() {
        if value.is_negative() {
            return Err(EditError::InvalidArgument(format!(
                "{what} marker must be a non-negative time, got {value}"
            )));
        }
    }
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(EditError::InvalidArgument(format!(
                "{what} marker start {s} is after end {e}"
            )));
        }
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::fixtures::secs;
    use crate::timeline::{TrackKind, EMPTY_TIMELINE_DURATION};

    #[test]
    fn test_new_engine_defaults() {
        let engine = TimelineEngine::new();
        assert_eq!(engine.duration(), EMPTY_TIMELINE_DURATION);
        assert_eq!(engine.playhead(), Time::ZERO);
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_playhead_is_clamped() {
        let mut engine = TimelineEngine::new();
        let rx = engine.subscribe();
        assert_eq!(engine.set_playhead(secs(90.0)), EMPTY_TIMELINE_DURATION);
        assert_eq!(engine.set_playhead(secs(-3.0)), Time::ZERO);
        assert_eq!(rx.try_iter().count(), 2);
        engine.set_playhead(Time::ZERO);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_markers_validate_order() {
        let mut engine = TimelineEngine::new();
        assert!(engine.set_in_out(Some(secs(5.0)), Some(secs(2.0))).is_err());
        assert!(engine.set_loop(Some(secs(-1.0)), None).is_err());
        engine.set_in_out(Some(secs(1.0)), Some(secs(4.0))).unwrap();
        assert_eq!(engine.state().in_point, Some(secs(1.0)));
        assert_eq!(engine.state().out_point, Some(secs(4.0)));
    }

    #[test]
    fn test_grid_interval_must_be_positive() {
        let mut engine = TimelineEngine::new();
        assert!(matches!(
            engine.set_grid_interval(Time::ZERO),
            Err(EditError::InvalidConfiguration(_))
        ));
        engine.set_grid_interval(secs(0.5)).unwrap();
        assert_eq!(engine.state().grid_interval, secs(0.5));
    }

    #[test]
    fn test_select_unknown_clip_fails() {
        let mut engine = TimelineEngine::new();
        assert!(matches!(
            engine.select_clip(Some(ClipId::new())),
            Err(EditError::ClipNotFound(_))
        ));
    }

    #[test]
    fn test_clips_in_range_unknown_track() {
        let mut engine = TimelineEngine::new();
        let track = engine.add_track(TrackKind::Video).unwrap();
        assert!(matches!(
            engine.clips_in_range(TrackId::new(), Time::ZERO, secs(1.0)),
            Err(EditError::TrackNotFound(_))
        ));
        assert!(matches!(
            engine.clips_in_range(track, secs(2.0), secs(1.0)),
            Err(EditError::InvalidArgument(_))
        ));
    }
}
