// src/editing.rs
//
// Every user-facing mutation. Each operation follows the same shape: resolve
// ids, validate and compute the candidate values, then hand one command to
// `commit`. Nothing is written to the model before validation passes.

use crate::engine::{DurationRule, TimelineEngine};
use crate::error::{finite, EditError, EditResult};
use crate::events::{TimelineEvent, TrimEdge};
use crate::history::{EditCommand, ShiftedClip};
use crate::snap::snap_if;
use crate::time::Time;
use crate::timeline::{
    BlendMode, Clip, ClipAttributes, ClipId, ClipSpan, Fades, Track, TrackFlags, TrackId, TrackKind,
    MAX_SPEED, MIN_DURATION, MIN_SPEED,
};
use std::path::Path;

/// Everything needed to place a new clip. Optional source fields are derived
/// from the timeline span when absent.
#[derive(Clone, Debug, PartialEq)]
pub struct AddClipRequest {
    pub track_id: TrackId,
    pub source_path: String,
    pub start_time: Time,
    pub duration: Time,
    pub source_in: Option<Time>,
    pub source_out: Option<Time>,
    pub source_duration: Option<Time>,
    pub speed: Option<f64>,
    pub name: Option<String>,
}

impl AddClipRequest {
    pub fn new(track_id: TrackId, source_path: impl Into<String>, start_time: Time, duration: Time) -> Self {
        Self {
            track_id,
            source_path: source_path.into(),
            start_time,
            duration,
            source_in: None,
            source_out: None,
            source_duration: None,
            speed: None,
            name: None,
        }
    }
}

fn default_name(source_path: &str) -> String {
    Path::new(source_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(source_path)
        .to_string()
}

impl TimelineEngine {
    // --- TRACKS ---

    /// Appends a track named after its kind, e.g. "Audio 2".
    pub fn add_track(&mut self, kind: TrackKind) -> EditResult<TrackId> {
        let same_kind = self.state.tracks.iter().filter(|t| t.kind == kind).count();
        let index = self.state.tracks.len();
        let track = Track::new(kind, format!("{} {}", kind.label(), same_kind + 1), index);
        let track_id = track.id;
        self.commit(
            EditCommand::AddTrack { index, track },
            DurationRule::Keep,
            vec![TimelineEvent::TrackAdded { track_id }],
        )?;
        Ok(track_id)
    }

    /// Removes the track and destroys the clips it owns.
    pub fn remove_track(&mut self, track_id: TrackId) -> EditResult<()> {
        let index = self
            .state
            .track_index(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        let track = &self.state.tracks[index];
        if track.flags.locked {
            return Err(EditError::LockedTrack(track_id));
        }
        let track = track.clone();
        self.commit(
            EditCommand::RemoveTrack { index, track },
            DurationRule::Recompute,
            vec![TimelineEvent::TrackRemoved { track_id }],
        )
    }

    pub fn move_track(&mut self, track_id: TrackId, new_index: usize) -> EditResult<()> {
        let from = self
            .state
            .track_index(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        if new_index >= self.state.tracks.len() {
            return Err(EditError::InvalidArgument(format!(
                "track index {new_index} out of range (0..{})",
                self.state.tracks.len()
            )));
        }
        if from == new_index {
            return Ok(());
        }
        self.commit(
            EditCommand::MoveTrack {
                track_id,
                from,
                to: new_index,
            },
            DurationRule::Keep,
            vec![TimelineEvent::TrackReordered {
                track_id,
                from,
                to: new_index,
            }],
        )
    }

    /// Replaces the track flags. Works on locked tracks, which is how they
    /// get unlocked.
    pub fn update_track_flags(&mut self, track_id: TrackId, flags: TrackFlags) -> EditResult<()> {
        let track = self
            .state
            .track(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        let opacity = finite(flags.opacity, "opacity")?;
        if !(0.0..=1.0).contains(&opacity) {
            return Err(EditError::InvalidArgument(format!(
                "opacity must lie in 0..=1, got {opacity}"
            )));
        }
        if !track.kind.is_visual() && flags.blend_mode != BlendMode::Normal {
            return Err(EditError::InvalidArgument(format!(
                "{} tracks cannot blend",
                track.kind
            )));
        }
        if track.flags == flags {
            return Ok(());
        }
        let before = track.flags.clone();
        self.commit(
            EditCommand::UpdateTrack {
                track_id,
                before,
                after: flags,
            },
            DurationRule::Keep,
            vec![TimelineEvent::TrackUpdated { track_id }],
        )
    }

    // --- CLIPS ---

    pub fn add_clip(&mut self, request: AddClipRequest) -> EditResult<ClipId> {
        let track_id = request.track_id;
        let track = self.unlocked_track(track_id)?;

        if request.source_path.trim().is_empty() {
            return Err(EditError::InvalidArgument("source path is empty".to_string()));
        }
        if request.duration < MIN_DURATION {
            return Err(EditError::InvalidArgument(format!(
                "duration {} is below the minimum {}",
                request.duration, MIN_DURATION
            )));
        }
        let speed = validate_speed(request.speed.unwrap_or(1.0))?;
        let start = snap_if(
            self.state.snap_enabled,
            request.start_time,
            self.state.grid_interval,
        )?
        .max(Time::ZERO);

        let source_in = request.source_in.unwrap_or(Time::ZERO);
        let source_out = request
            .source_out
            .unwrap_or_else(|| source_in + request.duration.mul_f64(speed));
        let source_duration = request.source_duration.unwrap_or(source_out);
        if source_in.is_negative() || source_in > source_out || source_out > source_duration {
            return Err(EditError::InvalidArgument(format!(
                "source range {source_in}..{source_out} does not fit source of {source_duration}"
            )));
        }

        let end = start + request.duration;
        if let Some(other) = track.first_overlap(start, end, None) {
            return Err(EditError::OverlapConflict {
                track: track_id,
                conflicting: other.id,
            });
        }

        let clip = Clip {
            id: ClipId::new(),
            name: request
                .name
                .unwrap_or_else(|| default_name(&request.source_path)),
            source_path: request.source_path,
            start_time: start,
            duration: request.duration,
            source_in,
            source_out,
            source_duration,
            speed,
            selected: false,
            gain: 1.0,
            fade_in: Time::ZERO,
            fade_out: Time::ZERO,
            freeze_frame: false,
            freeze_offset: Time::ZERO,
            transition_in: None,
            transition_out: None,
            color: None,
        };
        let clip_id = clip.id;
        self.commit(
            EditCommand::AddClip { track_id, clip },
            DurationRule::Extend { end },
            vec![TimelineEvent::ClipAdded { track_id, clip_id }],
        )?;
        Ok(clip_id)
    }

    /// Moves a clip along its own track. Returns the resolved start.
    pub fn move_clip(&mut self, clip_id: ClipId, start_time: Time) -> EditResult<Time> {
        let (track, clip) = self.editable_clip(clip_id)?;
        let start = snap_if(self.state.snap_enabled, start_time, self.state.grid_interval)?
            .max(Time::ZERO);
        if start == clip.start_time {
            return Ok(start);
        }
        let from = clip.start_time;
        if let Some(other) = track.first_overlap(start, start + clip.duration, Some(clip_id)) {
            return Err(EditError::OverlapConflict {
                track: track.id,
                conflicting: other.id,
            });
        }
        let track_id = track.id;
        self.commit(
            EditCommand::MoveClip {
                track_id,
                clip_id,
                from,
                to: start,
            },
            DurationRule::Recompute,
            vec![TimelineEvent::ClipMoved {
                clip_id,
                from,
                to: start,
            }],
        )?;
        Ok(start)
    }

    /// Moves a clip onto another track. Same-track requests behave as `move_clip`.
    pub fn relocate_clip(&mut self, clip_id: ClipId, to_track: TrackId, start_time: Time) -> EditResult<Time> {
        let (from, clip) = self.editable_clip(clip_id)?;
        if from.id == to_track {
            return self.move_clip(clip_id, start_time);
        }
        let from_track = from.id;
        let from_start = clip.start_time;
        let duration = clip.duration;
        let destination = self.unlocked_track(to_track)?;
        let start = snap_if(self.state.snap_enabled, start_time, self.state.grid_interval)?
            .max(Time::ZERO);
        if let Some(other) = destination.first_overlap(start, start + duration, None) {
            return Err(EditError::OverlapConflict {
                track: to_track,
                conflicting: other.id,
            });
        }
        self.commit(
            EditCommand::RelocateClip {
                clip_id,
                from_track,
                to_track,
                from_start,
                to_start: start,
            },
            DurationRule::Recompute,
            vec![TimelineEvent::ClipRelocated {
                clip_id,
                from_track,
                to_track,
            }],
        )?;
        Ok(start)
    }

    /// Drags one edge of a clip. The boundary is clamped against neighbours,
    /// the minimum duration and the available source media rather than
    /// rejected. Returns the resulting span.
    pub fn trim_clip(&mut self, clip_id: ClipId, edge: TrimEdge, boundary: Time) -> EditResult<ClipSpan> {
        let (track, clip) = self.editable_clip(clip_id)?;
        let proposed = snap_if(self.state.snap_enabled, boundary, self.state.grid_interval)?;
        let before = clip.span();
        let after = match edge {
            TrimEdge::Left => trim_left(track, clip, proposed)?,
            TrimEdge::Right => trim_right(track, clip, proposed)?,
        };
        let fades_before = clip.fades();
        let fades_after = fades_before.fit(after.duration);
        if after == before && fades_after == fades_before {
            return Ok(after);
        }
        self.commit(
            EditCommand::TrimClip {
                clip_id,
                edge,
                before,
                after,
                fades_before,
                fades_after,
            },
            DurationRule::Recompute,
            vec![TimelineEvent::ClipTrimmed { clip_id, edge }],
        )?;
        Ok(after)
    }

    /// Cuts a clip in two at `at`. The fade in stays on the first half and
    /// the fade out moves to the second, each shortened to fit. Returns the
    /// id of the second half, or `None` when `at` does not fall strictly
    /// inside the clip.
    pub fn split_clip(&mut self, clip_id: ClipId, at: Time) -> EditResult<Option<ClipId>> {
        let (_, clip) = self.editable_clip(clip_id)?;
        if !(clip.start_time < at && at < clip.end_time()) {
            log::debug!("[engine] split at {at} outside clip {clip_id}, ignored");
            return Ok(None);
        }
        let offset = at - clip.start_time;
        let split_source = if clip.freeze_frame {
            clip.source_in
        } else {
            (clip.source_in + offset.mul_f64(clip.speed)).clamp(clip.source_in, clip.source_out)
        };

        let before = clip.span();
        let after = ClipSpan {
            start_time: clip.start_time,
            duration: offset,
            source_in: clip.source_in,
            source_out: if clip.freeze_frame {
                clip.source_out
            } else {
                split_source
            },
        };
        let mut second = clip.clone();
        second.id = ClipId::new();
        second.name = format!("{} (2)", clip.name);
        second.selected = false;
        second.start_time = at;
        second.duration = clip.duration - offset;
        second.source_in = split_source;
        second.transition_in = None;
        second.set_fades(
            Fades {
                fade_in: Time::ZERO,
                fade_out: clip.fade_out,
            }
            .fit(second.duration),
        );
        let created = second.id;
        let fades_before = clip.fades();
        let fades_after = Fades {
            fade_in: clip.fade_in,
            fade_out: Time::ZERO,
        }
        .fit(offset);

        self.commit(
            EditCommand::SplitClip {
                clip_id,
                before,
                after,
                fades_before,
                fades_after,
                second,
            },
            DurationRule::Recompute,
            vec![TimelineEvent::ClipSplit {
                original: clip_id,
                created,
            }],
        )?;
        Ok(Some(created))
    }

    /// Lifts the clip, or ripple-deletes it when ripple editing is on.
    /// Returns how far later clips on the track were pulled back.
    pub fn delete_clip(&mut self, clip_id: ClipId) -> EditResult<Option<Time>> {
        let (track, clip) = self.editable_clip(clip_id)?;
        let track_id = track.id;
        let ripple = self.state.ripple_edit_enabled;
        let shifted: Vec<ShiftedClip> = if ripple {
            let after = track.position(clip_id).map_or(track.clips.len(), |i| i + 1);
            track.clips[after..]
                .iter()
                .map(|c| ShiftedClip {
                    clip_id: c.id,
                    from: c.start_time,
                    to: c.start_time - clip.duration,
                })
                .collect()
        } else {
            vec![]
        };
        let ripple_delta = ripple.then_some(clip.duration);
        let clip = clip.clone();
        self.commit(
            EditCommand::DeleteClip {
                track_id,
                clip,
                shifted,
            },
            DurationRule::Recompute,
            vec![TimelineEvent::ClipDeleted {
                track_id,
                clip_id,
                ripple_delta,
            }],
        )?;
        Ok(ripple_delta)
    }

    pub fn update_clip_attributes(&mut self, clip_id: ClipId, attrs: ClipAttributes) -> EditResult<()> {
        let (_, clip) = self.editable_clip(clip_id)?;
        let gain = finite(attrs.gain, "gain")?;
        if gain < 0.0 {
            return Err(EditError::InvalidArgument(format!("gain must be non-negative, got {gain}")));
        }
        for (what, value) in [
            ("fade in", attrs.fade_in),
            ("fade out", attrs.fade_out),
            ("freeze offset", attrs.freeze_offset),
        ] {
            if value.is_negative() {
                return Err(EditError::InvalidArgument(format!(
                    "{what} must be non-negative, got {value}"
                )));
            }
        }
        if attrs.fade_in + attrs.fade_out > clip.duration {
            return Err(EditError::InvalidArgument(format!(
                "fades of {} and {} exceed clip duration {}",
                attrs.fade_in, attrs.fade_out, clip.duration
            )));
        }
        if attrs.freeze_offset > clip.source_duration {
            return Err(EditError::InvalidArgument(format!(
                "freeze offset {} is past the end of the source",
                attrs.freeze_offset
            )));
        }
        if attrs.name.trim().is_empty() {
            return Err(EditError::InvalidArgument("clip name is empty".to_string()));
        }
        let before = clip.attributes();
        if before == attrs {
            return Ok(());
        }
        self.commit(
            EditCommand::UpdateClip {
                clip_id,
                before,
                after: attrs,
            },
            DurationRule::Keep,
            vec![TimelineEvent::ClipUpdated { clip_id }],
        )
    }

    // --- LOOKUP HELPERS ---

    fn unlocked_track(&self, track_id: TrackId) -> EditResult<&Track> {
        let track = self
            .state
            .track(track_id)
            .ok_or(EditError::TrackNotFound(track_id))?;
        if track.flags.locked {
            return Err(EditError::LockedTrack(track_id));
        }
        Ok(track)
    }

    /// The clip and its owning track, provided the track accepts edits.
    fn editable_clip(&self, clip_id: ClipId) -> EditResult<(&Track, &Clip)> {
        let track = self
            .state
            .track_of(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        if track.flags.locked {
            return Err(EditError::LockedTrack(track.id));
        }
        let clip = track.clip(clip_id).ok_or(EditError::ClipNotFound(clip_id))?;
        Ok((track, clip))
    }
}

fn validate_speed(speed: f64) -> EditResult<f64> {
    let speed = finite(speed, "speed")?;
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(EditError::InvalidArgument(format!(
            "speed {speed} outside {MIN_SPEED}..={MAX_SPEED}"
        )));
    }
    Ok(speed)
}

fn clamp_bounds(lo: Time, hi: Time, proposed: Time, clip_id: ClipId) -> EditResult<Time> {
    if lo > hi {
        return Err(EditError::InvalidArgument(format!(
            "clip {clip_id} cannot be trimmed: no boundary in {lo}..{hi}"
        )));
    }
    Ok(proposed.clamp(lo, hi))
}

fn trim_left(track: &Track, clip: &Clip, proposed: Time) -> EditResult<ClipSpan> {
    let (start, end) = (clip.start_time, clip.end_time());
    let mut lo = track
        .previous_end(start, clip.id)
        .unwrap_or(Time::ZERO)
        .max(Time::ZERO);
    if !clip.freeze_frame {
        // Cannot reveal media before the start of the source.
        lo = lo.max(start - clip.source_in.div_f64(clip.speed));
    }
    let hi = end - MIN_DURATION;
    let new_start = clamp_bounds(lo, hi, proposed, clip.id)?;

    let source_in = if clip.freeze_frame {
        clip.source_in
    } else {
        let ceiling = (clip.source_out - MIN_DURATION.mul_f64(clip.speed)).max(Time::ZERO);
        (clip.source_in + (new_start - start).mul_f64(clip.speed)).clamp(Time::ZERO, ceiling)
    };
    Ok(ClipSpan {
        start_time: new_start,
        duration: end - new_start,
        source_in,
        source_out: clip.source_out,
    })
}

fn trim_right(track: &Track, clip: &Clip, proposed: Time) -> EditResult<ClipSpan> {
    let (start, end) = (clip.start_time, clip.end_time());
    let lo = start + MIN_DURATION;
    let mut hi = track.next_start(end, clip.id).unwrap_or(Time::MAX);
    if !clip.freeze_frame {
        hi = hi.min(end + (clip.source_duration - clip.source_out).div_f64(clip.speed));
    }
    let new_end = clamp_bounds(lo, hi, proposed, clip.id)?;
    let duration = new_end - start;

    let source_out = if clip.freeze_frame {
        clip.source_out
    } else {
        (clip.source_out + (duration - clip.duration).mul_f64(clip.speed))
            .clamp(clip.source_in, clip.source_duration)
    };
    Ok(ClipSpan {
        start_time: start,
        duration,
        source_in: clip.source_in,
        source_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::fixtures::secs;
    use crate::timeline::EMPTY_TIMELINE_DURATION;

    fn engine_with_track() -> (TimelineEngine, TrackId) {
        let mut engine = TimelineEngine::new();
        let track = engine.add_track(TrackKind::Video).unwrap();
        (engine, track)
    }

    fn place(engine: &mut TimelineEngine, track: TrackId, start: f64, duration: f64) -> ClipId {
        engine
            .add_clip(AddClipRequest::new(track, "media/shot.mp4", secs(start), secs(duration)))
            .unwrap()
    }

    #[test]
    fn test_add_snaps_start_to_grid() {
        let (mut engine, track) = engine_with_track();
        engine.set_snap_enabled(true);
        let id = place(&mut engine, track, 4.3, 2.0);
        assert_eq!(engine.clip(id).unwrap().start_time, secs(4.0));
        assert_eq!(engine.clip(id).unwrap().name, "shot");
    }

    #[test]
    fn test_add_rejects_overlap() {
        let (mut engine, track) = engine_with_track();
        let first = place(&mut engine, track, 0.0, 5.0);
        let err = engine
            .add_clip(AddClipRequest::new(track, "b.mp4", secs(4.0), secs(2.0)))
            .unwrap_err();
        assert_eq!(
            err,
            EditError::OverlapConflict {
                track,
                conflicting: first
            }
        );
        assert_eq!(engine.undo_len(), 2);
    }

    #[test]
    fn test_add_extends_duration_with_padding() {
        let (mut engine, track) = engine_with_track();
        place(&mut engine, track, 55.0, 10.0);
        assert_eq!(engine.duration(), secs(95.0));
        place(&mut engine, track, 70.0, 5.0);
        assert_eq!(engine.duration(), secs(95.0));
    }

    #[test]
    fn test_add_validates_arguments() {
        let (mut engine, track) = engine_with_track();
        let short = AddClipRequest::new(track, "a.mp4", Time::ZERO, secs(0.05));
        assert!(matches!(engine.add_clip(short), Err(EditError::InvalidArgument(_))));

        let mut fast = AddClipRequest::new(track, "a.mp4", Time::ZERO, secs(1.0));
        fast.speed = Some(250.0);
        assert!(matches!(engine.add_clip(fast), Err(EditError::InvalidArgument(_))));

        let mut bad_source = AddClipRequest::new(track, "a.mp4", Time::ZERO, secs(1.0));
        bad_source.source_in = Some(secs(3.0));
        bad_source.source_out = Some(secs(2.0));
        assert!(matches!(engine.add_clip(bad_source), Err(EditError::InvalidArgument(_))));

        let missing = AddClipRequest::new(TrackId::new(), "a.mp4", Time::ZERO, secs(1.0));
        assert!(matches!(engine.add_clip(missing), Err(EditError::TrackNotFound(_))));
    }

    #[test]
    fn test_move_clamps_to_zero_and_rejects_overlap() {
        let (mut engine, track) = engine_with_track();
        let a = place(&mut engine, track, 0.0, 2.0);
        let b = place(&mut engine, track, 5.0, 2.0);
        assert_eq!(engine.move_clip(b, secs(-4.0)).unwrap_err(), EditError::OverlapConflict {
            track,
            conflicting: a
        });
        assert_eq!(engine.clip(b).unwrap().start_time, secs(5.0));

        assert_eq!(engine.move_clip(a, secs(-1.0)).unwrap(), Time::ZERO);
        assert_eq!(engine.move_clip(a, secs(9.0)).unwrap(), secs(9.0));
        let order: Vec<ClipId> = engine.track(track).unwrap().clips.iter().map(|c| c.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_move_to_same_start_records_nothing() {
        let (mut engine, track) = engine_with_track();
        let a = place(&mut engine, track, 3.0, 2.0);
        let depth = engine.undo_len();
        engine.move_clip(a, secs(3.0)).unwrap();
        assert_eq!(engine.undo_len(), depth);
    }

    #[test]
    fn test_relocate_transfers_between_tracks() {
        let (mut engine, video) = engine_with_track();
        let overlay = engine.add_track(TrackKind::Video).unwrap();
        let a = place(&mut engine, video, 0.0, 2.0);
        engine.relocate_clip(a, overlay, secs(1.0)).unwrap();
        assert!(engine.track(video).unwrap().clips.is_empty());
        assert_eq!(engine.track_of(a).unwrap().id, overlay);
        engine.undo();
        assert_eq!(engine.track_of(a).unwrap().id, video);
        assert_eq!(engine.clip(a).unwrap().start_time, Time::ZERO);
    }

    #[test]
    fn test_locked_track_rejects_edits() {
        let (mut engine, track) = engine_with_track();
        let a = place(&mut engine, track, 0.0, 4.0);
        let flags = TrackFlags {
            locked: true,
            ..TrackFlags::default()
        };
        engine.update_track_flags(track, flags).unwrap();

        assert_eq!(engine.move_clip(a, secs(1.0)).unwrap_err(), EditError::LockedTrack(track));
        assert_eq!(engine.split_clip(a, secs(2.0)).unwrap_err(), EditError::LockedTrack(track));
        assert_eq!(engine.delete_clip(a).unwrap_err(), EditError::LockedTrack(track));
        assert_eq!(engine.remove_track(track).unwrap_err(), EditError::LockedTrack(track));
        assert!(matches!(
            engine.add_clip(AddClipRequest::new(track, "b.mp4", secs(5.0), secs(1.0))),
            Err(EditError::LockedTrack(_))
        ));

        engine.update_track_flags(track, TrackFlags::default()).unwrap();
        assert!(engine.move_clip(a, secs(1.0)).is_ok());
    }

    #[test]
    fn test_trim_left_slides_source() {
        let (mut engine, track) = engine_with_track();
        let mut request = AddClipRequest::new(track, "a.mp4", secs(2.0), secs(6.0));
        request.source_in = Some(secs(1.0));
        request.source_duration = Some(secs(20.0));
        let id = engine.add_clip(request).unwrap();

        let span = engine.trim_clip(id, TrimEdge::Left, secs(4.0)).unwrap();
        assert_eq!(span.start_time, secs(4.0));
        assert_eq!(span.duration, secs(4.0));
        assert_eq!(span.source_in, secs(3.0));
        assert_eq!(span.source_out, secs(7.0));

        // Only one second of media precedes the original source in-point.
        let span = engine.trim_clip(id, TrimEdge::Left, Time::ZERO).unwrap();
        assert_eq!(span.start_time, secs(1.0));
        assert_eq!(span.source_in, Time::ZERO);
    }

    #[test]
    fn test_trim_clamps_to_neighbours_and_minimum() {
        let (mut engine, track) = engine_with_track();
        let mut request = AddClipRequest::new(track, "a.mp4", Time::ZERO, secs(4.0));
        request.source_duration = Some(secs(30.0));
        let a = engine.add_clip(request).unwrap();
        place(&mut engine, track, 6.0, 2.0);

        let span = engine.trim_clip(a, TrimEdge::Right, secs(10.0)).unwrap();
        assert_eq!(span.end_time(), secs(6.0));
        assert_eq!(span.source_out, secs(6.0));

        let span = engine.trim_clip(a, TrimEdge::Right, secs(-2.0)).unwrap();
        assert_eq!(span.duration, MIN_DURATION);
        assert_eq!(span.source_out, MIN_DURATION);
    }

    #[test]
    fn test_trim_right_stops_at_source_end() {
        let (mut engine, track) = engine_with_track();
        let a = place(&mut engine, track, 0.0, 4.0);
        let span = engine.trim_clip(a, TrimEdge::Right, secs(9.0)).unwrap();
        assert_eq!(span.duration, secs(4.0));
        assert_eq!(engine.undo_len(), 2);
    }

    #[test]
    fn test_trim_respects_speed() {
        let (mut engine, track) = engine_with_track();
        let mut request = AddClipRequest::new(track, "a.mp4", Time::ZERO, secs(4.0));
        request.speed = Some(2.0);
        request.source_duration = Some(secs(20.0));
        let a = engine.add_clip(request).unwrap();
        assert_eq!(engine.clip(a).unwrap().source_out, secs(8.0));
        let span = engine.trim_clip(a, TrimEdge::Right, secs(5.0)).unwrap();
        assert_eq!(span.source_out, secs(10.0));
    }

    #[test]
    fn test_split_partitions_source() {
        let (mut engine, track) = engine_with_track();
        let mut request = AddClipRequest::new(track, "a.mp4", secs(2.0), secs(8.0));
        request.source_out = Some(secs(8.0));
        let id = engine.add_clip(request).unwrap();

        let second = engine.split_clip(id, secs(5.0)).unwrap().unwrap();
        let first = engine.clip(id).unwrap();
        assert_eq!((first.start_time, first.end_time()), (secs(2.0), secs(5.0)));
        assert_eq!(first.source_out, secs(3.0));
        let second = engine.clip(second).unwrap();
        assert_eq!((second.start_time, second.end_time()), (secs(5.0), secs(10.0)));
        assert_eq!((second.source_in, second.source_out), (secs(3.0), secs(8.0)));
        assert_eq!(second.name, "a (2)");
    }

    fn faded(engine: &mut TimelineEngine, track: TrackId) -> ClipId {
        let id = place(engine, track, 0.0, 4.0);
        let mut attrs = engine.clip(id).unwrap().attributes();
        attrs.fade_in = secs(1.0);
        attrs.fade_out = secs(2.0);
        engine.update_clip_attributes(id, attrs).unwrap();
        id
    }

    #[test]
    fn test_split_divides_fades_between_halves() {
        let (mut engine, track) = engine_with_track();
        let id = faded(&mut engine, track);

        let second = engine.split_clip(id, secs(0.5)).unwrap().unwrap();
        let first = engine.clip(id).unwrap();
        assert_eq!((first.fade_in, first.fade_out), (secs(0.5), Time::ZERO));
        let tail = engine.clip(second).unwrap();
        assert_eq!((tail.fade_in, tail.fade_out), (Time::ZERO, secs(2.0)));

        for clip_id in [id, second] {
            let mut attrs = engine.clip(clip_id).unwrap().attributes();
            attrs.gain = 0.8;
            engine.update_clip_attributes(clip_id, attrs).unwrap();
        }

        engine.undo();
        engine.undo();
        engine.undo();
        let restored = engine.clip(id).unwrap();
        assert_eq!((restored.fade_in, restored.fade_out), (secs(1.0), secs(2.0)));
        assert_eq!(restored.duration, secs(4.0));
    }

    #[test]
    fn test_trim_shortens_fades_and_undo_restores_them() {
        let (mut engine, track) = engine_with_track();
        let id = faded(&mut engine, track);

        let span = engine.trim_clip(id, TrimEdge::Right, Time::ZERO).unwrap();
        assert_eq!(span.duration, MIN_DURATION);
        let clip = engine.clip(id).unwrap();
        assert_eq!((clip.fade_in, clip.fade_out), (MIN_DURATION, Time::ZERO));

        let mut attrs = clip.attributes();
        attrs.gain = 0.5;
        engine.update_clip_attributes(id, attrs).unwrap();

        engine.undo();
        engine.undo();
        let clip = engine.clip(id).unwrap();
        assert_eq!((clip.fade_in, clip.fade_out), (secs(1.0), secs(2.0)));
    }

    #[test]
    fn test_split_outside_clip_is_no_op() {
        let (mut engine, track) = engine_with_track();
        let id = place(&mut engine, track, 2.0, 3.0);
        let depth = engine.undo_len();
        assert_eq!(engine.split_clip(id, secs(2.0)).unwrap(), None);
        assert_eq!(engine.split_clip(id, secs(5.0)).unwrap(), None);
        assert_eq!(engine.undo_len(), depth);
    }

    #[test]
    fn test_ripple_delete_closes_gap() {
        let (mut engine, track) = engine_with_track();
        engine.set_ripple_edit(true);
        let a = place(&mut engine, track, 0.0, 5.0);
        let b = place(&mut engine, track, 5.0, 7.0);
        engine.delete_clip(a).unwrap();
        let b = engine.clip(b).unwrap();
        assert_eq!((b.start_time, b.end_time()), (Time::ZERO, secs(7.0)));
        assert_eq!(engine.duration(), secs(7.0));
    }

    #[test]
    fn test_lift_leaves_gap_and_clears_selection() {
        let (mut engine, track) = engine_with_track();
        let a = place(&mut engine, track, 0.0, 5.0);
        let b = place(&mut engine, track, 5.0, 7.0);
        engine.select_clip(Some(a)).unwrap();
        assert_eq!(engine.delete_clip(a).unwrap(), None);
        assert_eq!(engine.clip(b).unwrap().start_time, secs(5.0));
        assert_eq!(engine.selected_clip(), None);

        engine.undo();
        assert_eq!(engine.selected_clip(), Some(a));
        assert!(engine.clip(a).unwrap().selected);
    }

    #[test]
    fn test_remove_track_destroys_clips() {
        let (mut engine, track) = engine_with_track();
        let other = engine.add_track(TrackKind::Audio).unwrap();
        place(&mut engine, track, 0.0, 80.0);
        engine.remove_track(track).unwrap();
        assert_eq!(engine.tracks().len(), 1);
        assert_eq!(engine.tracks()[0].id, other);
        assert_eq!(engine.tracks()[0].order, 0);
        assert_eq!(engine.duration(), EMPTY_TIMELINE_DURATION);
    }

    #[test]
    fn test_track_names_count_per_kind() {
        let mut engine = TimelineEngine::new();
        engine.add_track(TrackKind::Video).unwrap();
        engine.add_track(TrackKind::Audio).unwrap();
        engine.add_track(TrackKind::Video).unwrap();
        let names: Vec<&str> = engine.tracks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Video 1", "Audio 1", "Video 2"]);
    }

    #[test]
    fn test_move_track_bounds() {
        let (mut engine, first) = engine_with_track();
        let second = engine.add_track(TrackKind::Title).unwrap();
        assert!(matches!(engine.move_track(first, 2), Err(EditError::InvalidArgument(_))));
        engine.move_track(first, 1).unwrap();
        assert_eq!(engine.tracks()[0].id, second);
        assert_eq!(engine.tracks()[1].order, 1);
    }

    #[test]
    fn test_track_flags_validation() {
        let mut engine = TimelineEngine::new();
        let audio = engine.add_track(TrackKind::Audio).unwrap();
        let too_opaque = TrackFlags {
            opacity: 1.5,
            ..TrackFlags::default()
        };
        assert!(matches!(
            engine.update_track_flags(audio, too_opaque),
            Err(EditError::InvalidArgument(_))
        ));
        let blended = TrackFlags {
            blend_mode: BlendMode::Screen,
            ..TrackFlags::default()
        };
        assert!(matches!(
            engine.update_track_flags(audio, blended),
            Err(EditError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clip_attributes_validation() {
        let (mut engine, track) = engine_with_track();
        let a = place(&mut engine, track, 0.0, 4.0);
        let mut attrs = engine.clip(a).unwrap().attributes();
        attrs.fade_in = secs(3.0);
        attrs.fade_out = secs(2.0);
        assert!(matches!(
            engine.update_clip_attributes(a, attrs.clone()),
            Err(EditError::InvalidArgument(_))
        ));
        attrs.fade_out = secs(1.0);
        attrs.gain = 0.5;
        engine.update_clip_attributes(a, attrs).unwrap();
        assert_eq!(engine.clip(a).unwrap().gain, 0.5);
        engine.undo();
        assert_eq!(engine.clip(a).unwrap().gain, 1.0);
    }
}
