// src/history.rs
//
// The command log. Entries are self-contained value objects: ids plus the
// field values on both sides of a mutation. Nothing here holds a reference
// into the live model, so a deleted clip simply stops resolving.

use crate::error::{EditError, EditResult};
use crate::events::{HistoryDirection, TimelineEvent, TrimEdge};
use crate::time::Time;
use crate::timeline::{
    Clip, ClipAttributes, ClipId, ClipSpan, Fades, TimelineState, Track, TrackFlags, TrackId,
};
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq)]
pub struct ShiftedClip {
    pub clip_id: ClipId,
    pub from: Time,
    pub to: Time,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditCommand {
    AddClip {
        track_id: TrackId,
        clip: Clip,
    },
    MoveClip {
        track_id: TrackId,
        clip_id: ClipId,
        from: Time,
        to: Time,
    },
    RelocateClip {
        clip_id: ClipId,
        from_track: TrackId,
        to_track: TrackId,
        from_start: Time,
        to_start: Time,
    },
    TrimClip {
        clip_id: ClipId,
        edge: TrimEdge,
        before: ClipSpan,
        after: ClipSpan,
        fades_before: Fades,
        fades_after: Fades,
    },
    /// Forward: truncate `clip_id` to `after` and insert `second` behind it.
    /// Backward: merge `second` back into the original.
    SplitClip {
        clip_id: ClipId,
        before: ClipSpan,
        after: ClipSpan,
        fades_before: Fades,
        fades_after: Fades,
        second: Clip,
    },
    DeleteClip {
        track_id: TrackId,
        clip: Clip,
        shifted: Vec<ShiftedClip>,
    },
    UpdateClip {
        clip_id: ClipId,
        before: ClipAttributes,
        after: ClipAttributes,
    },
    AddTrack {
        index: usize,
        track: Track,
    },
    RemoveTrack {
        index: usize,
        track: Track,
    },
    MoveTrack {
        track_id: TrackId,
        from: usize,
        to: usize,
    },
    UpdateTrack {
        track_id: TrackId,
        before: TrackFlags,
        after: TrackFlags,
    },
}

impl EditCommand {
    pub fn label(&self) -> &'static str {
        match self {
            EditCommand::AddClip { .. } => "Add clip",
            EditCommand::MoveClip { .. } => "Move clip",
            EditCommand::RelocateClip { .. } => "Relocate clip",
            EditCommand::TrimClip { .. } => "Trim clip",
            EditCommand::SplitClip { .. } => "Split clip",
            EditCommand::DeleteClip { shifted, .. } if !shifted.is_empty() => "Ripple delete",
            EditCommand::DeleteClip { .. } => "Delete clip",
            EditCommand::UpdateClip { .. } => "Edit clip",
            EditCommand::AddTrack { .. } => "Add track",
            EditCommand::RemoveTrack { .. } => "Remove track",
            EditCommand::MoveTrack { .. } => "Move track",
            EditCommand::UpdateTrack { .. } => "Edit track",
        }
    }

    /// Performs the forward mutation. Lookups are resolved before anything is
    /// written, so a failure leaves `state` untouched.
    pub fn apply(&self, state: &mut TimelineState) -> EditResult<()> {
        match self {
            EditCommand::AddClip { track_id, clip } => {
                track_mut(state, *track_id)?.insert_sorted(clip.clone());
            }
            EditCommand::MoveClip {
                track_id,
                clip_id,
                to,
                ..
            } => reposition(state, *track_id, *clip_id, *to)?,
            EditCommand::RelocateClip {
                clip_id,
                from_track,
                to_track,
                to_start,
                ..
            } => transfer(state, *clip_id, *from_track, *to_track, *to_start)?,
            EditCommand::TrimClip {
                clip_id,
                after,
                fades_after,
                ..
            } => {
                let clip = clip_mut(state, *clip_id)?;
                clip.set_span(*after);
                clip.set_fades(*fades_after);
            }
            EditCommand::SplitClip {
                clip_id,
                after,
                fades_after,
                second,
                ..
            } => {
                let (ti, ci) = state
                    .locate(*clip_id)
                    .ok_or(EditError::ClipNotFound(*clip_id))?;
                let track = &mut state.tracks[ti];
                let original = &mut track.clips[ci];
                original.set_span(*after);
                original.set_fades(*fades_after);
                original.transition_out = None;
                track.clips.insert(ci + 1, second.clone());
            }
            EditCommand::DeleteClip {
                track_id,
                clip,
                shifted,
            } => {
                let track = track_mut(state, *track_id)?;
                if track.position(clip.id).is_none() {
                    return Err(EditError::ClipNotFound(clip.id));
                }
                ensure_present(track, shifted)?;
                track.remove(clip.id);
                for shift in shifted {
                    if let Some(c) = track.clip_mut(shift.clip_id) {
                        c.start_time = shift.to;
                    }
                }
            }
            EditCommand::UpdateClip { clip_id, after, .. } => {
                clip_mut(state, *clip_id)?.set_attributes(after.clone());
            }
            EditCommand::AddTrack { index, track } => {
                let index = (*index).min(state.tracks.len());
                state.tracks.insert(index, track.clone());
                state.renumber_tracks();
            }
            EditCommand::RemoveTrack { track, .. } => {
                let index = state
                    .track_index(track.id)
                    .ok_or(EditError::TrackNotFound(track.id))?;
                state.tracks.remove(index);
                state.renumber_tracks();
            }
            EditCommand::MoveTrack { track_id, to, .. } => reorder(state, *track_id, *to)?,
            EditCommand::UpdateTrack { track_id, after, .. } => {
                track_mut(state, *track_id)?.flags = after.clone();
            }
        }
        Ok(())
    }

    /// Performs the inverse mutation.
    pub fn revert(&self, state: &mut TimelineState) -> EditResult<()> {
        match self {
            EditCommand::AddClip { track_id, clip } => {
                track_mut(state, *track_id)?
                    .remove(clip.id)
                    .ok_or(EditError::ClipNotFound(clip.id))?;
            }
            EditCommand::MoveClip {
                track_id,
                clip_id,
                from,
                ..
            } => reposition(state, *track_id, *clip_id, *from)?,
            EditCommand::RelocateClip {
                clip_id,
                from_track,
                to_track,
                from_start,
                ..
            } => transfer(state, *clip_id, *to_track, *from_track, *from_start)?,
            EditCommand::TrimClip {
                clip_id,
                before,
                fades_before,
                ..
            } => {
                let clip = clip_mut(state, *clip_id)?;
                clip.set_span(*before);
                clip.set_fades(*fades_before);
            }
            EditCommand::SplitClip {
                clip_id,
                before,
                fades_before,
                second,
                ..
            } => {
                let (ti, ci) = state
                    .locate(*clip_id)
                    .ok_or(EditError::ClipNotFound(*clip_id))?;
                let track = &mut state.tracks[ti];
                if track.position(second.id).is_none() {
                    return Err(EditError::ClipNotFound(second.id));
                }
                track.remove(second.id);
                let original = &mut track.clips[ci];
                original.set_span(*before);
                original.set_fades(*fades_before);
                original.transition_out = second.transition_out.clone();
            }
            EditCommand::DeleteClip {
                track_id,
                clip,
                shifted,
            } => {
                let track = track_mut(state, *track_id)?;
                ensure_present(track, shifted)?;
                for shift in shifted {
                    if let Some(c) = track.clip_mut(shift.clip_id) {
                        c.start_time = shift.from;
                    }
                }
                track.insert_sorted(clip.clone());
            }
            EditCommand::UpdateClip {
                clip_id, before, ..
            } => {
                clip_mut(state, *clip_id)?.set_attributes(before.clone());
            }
            EditCommand::AddTrack { track, .. } => {
                let index = state
                    .track_index(track.id)
                    .ok_or(EditError::TrackNotFound(track.id))?;
                state.tracks.remove(index);
                state.renumber_tracks();
            }
            EditCommand::RemoveTrack { index, track } => {
                let index = (*index).min(state.tracks.len());
                state.tracks.insert(index, track.clone());
                state.renumber_tracks();
            }
            EditCommand::MoveTrack { track_id, from, .. } => reorder(state, *track_id, *from)?,
            EditCommand::UpdateTrack {
                track_id, before, ..
            } => {
                track_mut(state, *track_id)?.flags = before.clone();
            }
        }
        Ok(())
    }

    /// The entity events for replaying this command in `direction`, read
    /// against `state` as it stands afterwards.
    pub fn replay_events(&self, direction: HistoryDirection, state: &TimelineState) -> Vec<TimelineEvent> {
        let undo = direction == HistoryDirection::Undo;
        match self {
            EditCommand::AddClip { track_id, clip } if undo => vec![TimelineEvent::ClipDeleted {
                track_id: *track_id,
                clip_id: clip.id,
                ripple_delta: None,
            }],
            EditCommand::AddClip { track_id, clip } => vec![TimelineEvent::ClipAdded {
                track_id: *track_id,
                clip_id: clip.id,
            }],
            EditCommand::MoveClip {
                clip_id, from, to, ..
            } => {
                let (from, to) = if undo { (*to, *from) } else { (*from, *to) };
                vec![TimelineEvent::ClipMoved {
                    clip_id: *clip_id,
                    from,
                    to,
                }]
            }
            EditCommand::RelocateClip {
                clip_id,
                from_track,
                to_track,
                ..
            } => {
                let (from_track, to_track) = if undo {
                    (*to_track, *from_track)
                } else {
                    (*from_track, *to_track)
                };
                vec![TimelineEvent::ClipRelocated {
                    clip_id: *clip_id,
                    from_track,
                    to_track,
                }]
            }
            EditCommand::TrimClip { clip_id, edge, .. } => vec![TimelineEvent::ClipTrimmed {
                clip_id: *clip_id,
                edge: *edge,
            }],
            EditCommand::SplitClip {
                clip_id, second, ..
            } if undo => {
                let mut events = Vec::with_capacity(2);
                if let Some(track) = state.track_of(*clip_id) {
                    events.push(TimelineEvent::ClipDeleted {
                        track_id: track.id,
                        clip_id: second.id,
                        ripple_delta: None,
                    });
                }
                events.push(TimelineEvent::ClipTrimmed {
                    clip_id: *clip_id,
                    edge: TrimEdge::Right,
                });
                events
            }
            EditCommand::SplitClip {
                clip_id, second, ..
            } => vec![TimelineEvent::ClipSplit {
                original: *clip_id,
                created: second.id,
            }],
            EditCommand::DeleteClip {
                track_id,
                clip,
                shifted,
            } if undo => {
                let mut events = vec![TimelineEvent::ClipAdded {
                    track_id: *track_id,
                    clip_id: clip.id,
                }];
                events.extend(shifted.iter().map(|s| TimelineEvent::ClipMoved {
                    clip_id: s.clip_id,
                    from: s.to,
                    to: s.from,
                }));
                events
            }
            EditCommand::DeleteClip {
                track_id,
                clip,
                shifted,
            } => vec![TimelineEvent::ClipDeleted {
                track_id: *track_id,
                clip_id: clip.id,
                ripple_delta: (!shifted.is_empty()).then_some(clip.duration),
            }],
            EditCommand::UpdateClip { clip_id, .. } => {
                vec![TimelineEvent::ClipUpdated { clip_id: *clip_id }]
            }
            EditCommand::AddTrack { track, .. } if undo => {
                vec![TimelineEvent::TrackRemoved { track_id: track.id }]
            }
            EditCommand::AddTrack { track, .. } => {
                vec![TimelineEvent::TrackAdded { track_id: track.id }]
            }
            EditCommand::RemoveTrack { track, .. } if undo => {
                vec![TimelineEvent::TrackAdded { track_id: track.id }]
            }
            EditCommand::RemoveTrack { track, .. } => {
                vec![TimelineEvent::TrackRemoved { track_id: track.id }]
            }
            EditCommand::MoveTrack { track_id, from, to } => {
                let (from, to) = if undo { (*to, *from) } else { (*from, *to) };
                vec![TimelineEvent::TrackReordered {
                    track_id: *track_id,
                    from,
                    to,
                }]
            }
            EditCommand::UpdateTrack { track_id, .. } => {
                vec![TimelineEvent::TrackUpdated { track_id: *track_id }]
            }
        }
    }
}

fn track_mut(state: &mut TimelineState, id: TrackId) -> EditResult<&mut Track> {
    state.track_mut(id).ok_or(EditError::TrackNotFound(id))
}

fn clip_mut(state: &mut TimelineState, id: ClipId) -> EditResult<&mut Clip> {
    state.clip_mut(id).ok_or(EditError::ClipNotFound(id))
}

fn ensure_present(track: &Track, shifted: &[ShiftedClip]) -> EditResult<()> {
    match shifted.iter().find(|s| track.position(s.clip_id).is_none()) {
        Some(missing) => Err(EditError::ClipNotFound(missing.clip_id)),
        None => Ok(()),
    }
}

fn reposition(state: &mut TimelineState, track_id: TrackId, clip_id: ClipId, start: Time) -> EditResult<()> {
    let track = track_mut(state, track_id)?;
    let mut clip = track.remove(clip_id).ok_or(EditError::ClipNotFound(clip_id))?;
    clip.start_time = start;
    track.insert_sorted(clip);
    Ok(())
}

fn transfer(
    state: &mut TimelineState,
    clip_id: ClipId,
    from: TrackId,
    to: TrackId,
    start: Time,
) -> EditResult<()> {
    if state.track(to).is_none() {
        return Err(EditError::TrackNotFound(to));
    }
    let mut clip = track_mut(state, from)?
        .remove(clip_id)
        .ok_or(EditError::ClipNotFound(clip_id))?;
    clip.start_time = start;
    track_mut(state, to)?.insert_sorted(clip);
    Ok(())
}

fn reorder(state: &mut TimelineState, track_id: TrackId, to: usize) -> EditResult<()> {
    let from = state
        .track_index(track_id)
        .ok_or(EditError::TrackNotFound(track_id))?;
    let track = state.tracks.remove(from);
    let to = to.min(state.tracks.len());
    state.tracks.insert(to, track);
    state.renumber_tracks();
    Ok(())
}

/// Transport values every entry snapshots on both sides, since they are
/// recomputed (duration, playhead clamp) or cleared (selection) as side
/// effects rather than stored in the command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transport {
    pub duration: Time,
    pub playhead: Time,
    pub selected_clip: Option<ClipId>,
}

impl Transport {
    pub fn capture(state: &TimelineState) -> Self {
        Self {
            duration: state.duration,
            playhead: state.playhead,
            selected_clip: state.selected_clip,
        }
    }

    pub fn restore(&self, state: &mut TimelineState) {
        state.duration = self.duration;
        state.playhead = self.playhead;
        state.set_selection(self.selected_clip);
    }
}

#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub label: String,
    pub recorded_at: DateTime<Utc>,
    pub command: EditCommand,
    pub before: Transport,
    pub after: Transport,
}

impl HistoryEntry {
    pub fn new(command: EditCommand, before: Transport, after: Transport) -> Self {
        Self {
            label: command.label().to_string(),
            recorded_at: Utc::now(),
            command,
            before,
            after,
        }
    }
}

/// Two-stack undo/redo log. Pushing a new entry discards the redo branch.
#[derive(Debug, Default, Clone)]
pub struct CommandLog {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: Option<usize>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` keeps every entry. `Some(n)` evicts the oldest beyond `n`.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.enforce_limit();
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push(entry);
        self.enforce_limit();
        log::debug!(
            "[history] pushed '{}' (undo depth {})",
            self.undo.last().map(|e| e.label.as_str()).unwrap_or_default(),
            self.undo.len()
        );
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            if self.undo.len() > limit {
                let excess = self.undo.len() - limit;
                self.undo.drain(..excess);
            }
        }
    }

    /// Reverts the newest entry. Returns `None` on an empty stack or when the
    /// entry no longer resolves against `state`; the latter entry is dropped.
    pub fn undo(&mut self, state: &mut TimelineState) -> Option<&HistoryEntry> {
        let entry = self.undo.pop()?;
        if let Err(err) = entry.command.revert(state) {
            log_dropped(&entry.label, "undo", &err);
            return None;
        }
        entry.before.restore(state);
        log::info!("[history] undo '{}'", entry.label);
        self.redo.push(entry);
        self.redo.last()
    }

    /// Re-applies the newest undone entry without clearing the redo stack.
    pub fn redo(&mut self, state: &mut TimelineState) -> Option<&HistoryEntry> {
        let entry = self.redo.pop()?;
        if let Err(err) = entry.command.apply(state) {
            log_dropped(&entry.label, "redo", &err);
            return None;
        }
        entry.after.restore(state);
        log::info!("[history] redo '{}'", entry.label);
        self.undo.push(entry);
        self.undo.last()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.last().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }
}

/// A missing entity means the model moved on without this entry; anything
/// else is an engine fault.
fn log_dropped(label: &str, direction: &str, err: &EditError) {
    if err.is_not_found() {
        log::warn!("[history] dropping '{}' on {}: {}", label, direction, err);
    } else {
        log::error!("[history] dropping '{}' on {}: {}", label, direction, err);
    }
}
