// src/action_router.rs
use crate::edit_plan::{ClipRef, ClipTarget, EditAction, EditPlan, TrackRef};
use crate::editing::AddClipRequest;
use crate::engine::TimelineEngine;
use crate::error::{seconds, EditError, EditResult};
use crate::time::Time;
use crate::timeline::{ClipId, TrackId};
use crate::validator::{validate_plan, ValidationError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Action {index} ({action}) failed: {source}")]
    Action {
        index: usize,
        action: &'static str,
        #[source]
        source: EditError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub applied: usize,
    pub created_clips: Vec<ClipId>,
    pub created_tracks: Vec<TrackId>,
    pub duration: Time,
}

/// Validates and replays `plan`. All or nothing: if any action fails the
/// timeline and its history are put back exactly as they were.
pub fn run_edit_plan(engine: &mut TimelineEngine, plan: &EditPlan) -> Result<PlanReport, RouterError> {
    log::info!(
        "[router] executing edit plan with {} actions{}",
        plan.actions.len(),
        plan.description
            .as_deref()
            .map(|d| format!(": {d}"))
            .unwrap_or_default()
    );
    validate_plan(plan, engine.state())?;

    log::debug!(
        "[router] state before: {} clips, {}",
        engine.state().clip_count(),
        engine.duration()
    );
    let checkpoint = engine.checkpoint();
    let mut report = PlanReport {
        applied: 0,
        created_clips: vec![],
        created_tracks: vec![],
        duration: engine.duration(),
    };

    for (index, action) in plan.actions.iter().enumerate() {
        if let Err(source) = execute(engine, action, &mut report) {
            log::warn!(
                "[router] action {} ({}) failed, rolling back: {}",
                index,
                action.name(),
                source
            );
            engine.restore(checkpoint);
            return Err(RouterError::Action {
                index,
                action: action.name(),
                source,
            });
        }
        report.applied += 1;
    }

    report.duration = engine.duration();
    log::info!(
        "[router] plan applied: {} clips, {}",
        engine.state().clip_count(),
        report.duration
    );
    Ok(report)
}

fn execute(engine: &mut TimelineEngine, action: &EditAction, report: &mut PlanReport) -> EditResult<()> {
    match action {
        EditAction::AddTrack { kind } => {
            let id = engine.add_track(*kind)?;
            report.created_tracks.push(id);
        }
        EditAction::RemoveTrack { track } => {
            let id = resolve_track(engine, track)?;
            engine.remove_track(id)?;
        }
        EditAction::MoveTrack { track, to_index } => {
            let id = resolve_track(engine, track)?;
            engine.move_track(id, *to_index)?;
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
            name,
        } => {
            let mut request = AddClipRequest::new(
                resolve_track(engine, track)?,
                source_path.clone(),
                seconds(*start_time, "start_time")?,
                seconds(*duration, "duration")?,
            );
            request.source_in = optional_seconds(*source_in, "source_in")?;
            request.source_out = optional_seconds(*source_out, "source_out")?;
            request.source_duration = optional_seconds(*source_duration, "source_duration")?;
            request.speed = *speed;
            request.name = name.clone();
            let id = engine.add_clip(request)?;
            report.created_clips.push(id);
        }
        EditAction::Move {
            target_clip_id,
            new_start_time,
        } => {
            let id = resolve_clip(target_clip_id, report)?;
            engine.move_clip(id, seconds(*new_start_time, "new_start_time")?)?;
        }
        EditAction::Relocate {
            target_clip_id,
            track,
            new_start_time,
        } => {
            let id = resolve_clip(target_clip_id, report)?;
            let track = resolve_track(engine, track)?;
            engine.relocate_clip(id, track, seconds(*new_start_time, "new_start_time")?)?;
        }
        EditAction::Trim {
            target_clip_id,
            edge,
            time,
        } => {
            let id = resolve_clip(target_clip_id, report)?;
            engine.trim_clip(id, *edge, seconds(*time, "time")?)?;
        }
        EditAction::Split {
            target_clip_id,
            split_time,
        } => {
            let id = resolve_clip(target_clip_id, report)?;
            if let Some(created) = engine.split_clip(id, seconds(*split_time, "split_time")?)? {
                report.created_clips.push(created);
            }
        }
        EditAction::Delete { target_clip_id } => {
            let id = resolve_clip(target_clip_id, report)?;
            engine.delete_clip(id)?;
        }
        EditAction::Select { target_clip_id } => {
            let id = target_clip_id
                .as_ref()
                .map(|clip| resolve_clip(clip, report))
                .transpose()?;
            engine.select_clip(id)?;
        }
        EditAction::SetPlayhead { time } => {
            engine.set_playhead(seconds(*time, "time")?);
        }
        EditAction::Undo => {
            engine.undo();
        }
        EditAction::Redo => {
            engine.redo();
        }
    }
    Ok(())
}

fn optional_seconds(value: Option<f64>, what: &str) -> EditResult<Option<Time>> {
    value.map(|v| seconds(v, what)).transpose()
}

fn resolve_track(engine: &TimelineEngine, track: &TrackRef) -> EditResult<TrackId> {
    match track {
        TrackRef::Index(i) => engine.tracks().get(*i).map(|t| t.id).ok_or_else(|| {
            EditError::InvalidArgument(format!(
                "track index {i} out of range (0..{})",
                engine.tracks().len()
            ))
        }),
        TrackRef::Id(raw) => Uuid::parse_str(raw)
            .map(TrackId)
            .map_err(|_| EditError::InvalidArgument(format!("'{raw}' is not a track id"))),
    }
}

fn resolve_clip(clip: &ClipRef, report: &PlanReport) -> EditResult<ClipId> {
    match clip.target() {
        Some(ClipTarget::Existing(id)) => Ok(id),
        Some(ClipTarget::Created(n)) => report.created_clips.get(n).copied().ok_or_else(|| {
            EditError::InvalidArgument(format!("@{n} does not name a clip created by this plan"))
        }),
        None => Err(EditError::InvalidArgument(format!(
            "'{}' is neither a clip id nor @N",
            clip.0
        ))),
    }
}
