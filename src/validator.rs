// src/validator.rs
use crate::edit_plan::{ClipRef, ClipTarget, EditAction, EditPlan, TrackRef};
use crate::timeline::{ClipId, TimelineState, TrackId};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub const VALIDATION_REJECTED: &str = "VALIDATION_REJECTED";

#[derive(Error, Debug, Serialize, PartialEq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    pub offending_action: Option<String>,
}

impl ValidationError {
    fn rejected(index: Option<usize>, action: Option<&EditAction>, message: String) -> Self {
        Self {
            code: VALIDATION_REJECTED.to_string(),
            message: match index {
                Some(i) => format!("action {i}: {message}"),
                None => message,
            },
            offending_action: action.map(|a| a.name().to_string()),
        }
    }
}

/// Static checks run before any action touches the engine. Anything that
/// depends on intermediate results (overlaps, clamping) is left to execution.
pub fn validate_plan(plan: &EditPlan, state: &TimelineState) -> Result<(), ValidationError> {
    if plan.actions.is_empty() {
        return Err(ValidationError::rejected(
            None,
            None,
            "Plan contains no actions.".to_string(),
        ));
    }

    let mut track_count = state.tracks.len();
    let mut created = 0usize;

    for (index, action) in plan.actions.iter().enumerate() {
        let fail = |message: String| ValidationError::rejected(Some(index), Some(action), message);
        let check_clip = |clip: &ClipRef| -> Result<(), ValidationError> {
            match clip.target() {
                None => Err(fail(format!("'{}' is neither a clip id nor @N", clip.0))),
                Some(ClipTarget::Created(n)) if n >= created => Err(fail(format!(
                    "@{n} refers to a clip this plan has not created yet"
                ))),
                Some(ClipTarget::Created(_)) => Ok(()),
                Some(ClipTarget::Existing(id)) => match state.clip(id) {
                    Some(_) => Ok(()),
                    None => Err(fail(format!("clip {} not found in timeline", id))),
                },
            }
        };
        let check_track = |track: &TrackRef, count: usize| -> Result<(), ValidationError> {
            match track {
                TrackRef::Index(i) if *i >= count => {
                    Err(fail(format!("track index {i} out of range (0..{count})")))
                }
                TrackRef::Index(_) => Ok(()),
                TrackRef::Id(raw) => match Uuid::parse_str(raw) {
                    Ok(id) if state.track(TrackId(id)).is_some() => Ok(()),
                    Ok(_) => Err(fail(format!("track {raw} not found in timeline"))),
                    Err(_) => Err(fail(format!("'{raw}' is not a track id"))),
                },
            }
        };
        let check_time = |what: &str, value: f64| -> Result<(), ValidationError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(fail(format!("{what} must be a non-negative number, got {value}")))
            }
        };

        match action {
            EditAction::AddTrack { .. } => track_count += 1,
            EditAction::RemoveTrack { track } => {
                check_track(track, track_count)?;
                track_count = track_count.saturating_sub(1);
            }
            EditAction::MoveTrack { track, to_index } => {
                check_track(track, track_count)?;
                if *to_index >= track_count {
                    return Err(fail(format!(
                        "target index {to_index} out of range (0..{track_count})"
                    )));
                }
            }
            EditAction::AddClip {
                track,
                source_path,
                start_time,
                duration,
                source_in,
                source_out,
                source_duration,
                speed,
                ..
            } => {
                check_track(track, track_count)?;
                if source_path.trim().is_empty() {
                    return Err(fail("source_path is empty".to_string()));
                }
                check_time("start_time", *start_time)?;
                if !(duration.is_finite() && *duration > 0.0) {
                    return Err(fail(format!("duration must be positive, got {duration}")));
                }
                for (what, value) in [
                    ("source_in", source_in),
                    ("source_out", source_out),
                    ("source_duration", source_duration),
                ] {
                    if let Some(value) = value {
                        check_time(what, *value)?;
                    }
                }
                if let Some(speed) = speed {
                    if !(speed.is_finite() && *speed > 0.0) {
                        return Err(fail(format!("speed must be positive, got {speed}")));
                    }
                }
            }
            EditAction::Move {
                target_clip_id,
                new_start_time,
            } => {
                check_clip(target_clip_id)?;
                if !new_start_time.is_finite() {
                    return Err(fail("new_start_time must be finite".to_string()));
                }
            }
            EditAction::Relocate {
                target_clip_id,
                track,
                new_start_time,
            } => {
                check_clip(target_clip_id)?;
                check_track(track, track_count)?;
                if !new_start_time.is_finite() {
                    return Err(fail("new_start_time must be finite".to_string()));
                }
            }
            EditAction::Trim {
                target_clip_id,
                time,
                ..
            } => {
                check_clip(target_clip_id)?;
                if !time.is_finite() {
                    return Err(fail("time must be finite".to_string()));
                }
            }
            EditAction::Split {
                target_clip_id,
                split_time,
            } => {
                check_clip(target_clip_id)?;
                check_time("split_time", *split_time)?;
            }
            EditAction::Delete { target_clip_id } => check_clip(target_clip_id)?,
            EditAction::Select { target_clip_id } => {
                if let Some(clip) = target_clip_id {
                    check_clip(clip)?;
                }
            }
            EditAction::SetPlayhead { time } => {
                if !time.is_finite() {
                    return Err(fail("time must be finite".to_string()));
                }
            }
            EditAction::Undo | EditAction::Redo => {}
        }

        if action.creates_clip() {
            created += 1;
        }
    }

    Ok(())
}

/// Ids referenced by the plan that the starting state does not contain.
pub fn unknown_clip_ids(plan: &EditPlan, state: &TimelineState) -> Vec<ClipId> {
    plan.actions
        .iter()
        .filter_map(|action| match action {
            EditAction::Move { target_clip_id, .. }
            | EditAction::Relocate { target_clip_id, .. }
            | EditAction::Trim { target_clip_id, .. }
            | EditAction::Split { target_clip_id, .. }
            | EditAction::Delete { target_clip_id } => Some(target_clip_id),
            EditAction::Select { target_clip_id } => target_clip_id.as_ref(),
            _ => None,
        })
        .filter_map(ClipRef::target)
        .filter_map(|target| match target {
            ClipTarget::Existing(id) if state.clip(id).is_none() => Some(id),
            _ => None,
        })
        .collect()
}
