// src/edit_plan.rs
//
// Scripted batch edits. A plan is a JSON document of actions that the action
// router replays against an engine. Times are seconds.

use crate::events::TrimEdge;
use crate::timeline::{ClipId, TrackKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EditPlan {
    pub actions: Vec<EditAction>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A track by stacking index or by id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TrackRef {
    Index(usize),
    Id(String),
}

/// A clip by id, or `"@N"` for the N-th clip this plan created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct ClipRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipTarget {
    Created(usize),
    Existing(ClipId),
}

impl ClipRef {
    pub fn target(&self) -> Option<ClipTarget> {
        let raw = self.0.trim();
        match raw.strip_prefix('@') {
            Some(n) => n.parse().ok().map(ClipTarget::Created),
            None => Uuid::parse_str(raw)
                .ok()
                .map(|id| ClipTarget::Existing(ClipId(id))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditAction {
    AddTrack {
        kind: TrackKind,
    },
    RemoveTrack {
        track: TrackRef,
    },
    MoveTrack {
        track: TrackRef,
        to_index: usize,
    },
    AddClip {
        track: TrackRef,
        source_path: String,
        start_time: f64,
        duration: f64,
        #[serde(default)]
        source_in: Option<f64>,
        #[serde(default)]
        source_out: Option<f64>,
        #[serde(default)]
        source_duration: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        name: Option<String>,
    },
    Move {
        target_clip_id: ClipRef,
        new_start_time: f64,
    },
    Relocate {
        target_clip_id: ClipRef,
        track: TrackRef,
        new_start_time: f64,
    },
    Trim {
        target_clip_id: ClipRef,
        edge: TrimEdge,
        time: f64,
    },
    Split {
        target_clip_id: ClipRef,
        split_time: f64,
    },
    Delete {
        target_clip_id: ClipRef,
    },
    Select {
        #[serde(default)]
        target_clip_id: Option<ClipRef>,
    },
    SetPlayhead {
        time: f64,
    },
    Undo,
    Redo,
}

impl EditAction {
    pub fn name(&self) -> &'static str {
        match self {
            EditAction::AddTrack { .. } => "ADD_TRACK",
            EditAction::RemoveTrack { .. } => "REMOVE_TRACK",
            EditAction::MoveTrack { .. } => "MOVE_TRACK",
            EditAction::AddClip { .. } => "ADD_CLIP",
            EditAction::Move { .. } => "MOVE",
            EditAction::Relocate { .. } => "RELOCATE",
            EditAction::Trim { .. } => "TRIM",
            EditAction::Split { .. } => "SPLIT",
            EditAction::Delete { .. } => "DELETE",
            EditAction::Select { .. } => "SELECT",
            EditAction::SetPlayhead { .. } => "SET_PLAYHEAD",
            EditAction::Undo => "UNDO",
            EditAction::Redo => "REDO",
        }
    }

    /// Whether a successful run of this action may add a clip to the `@N` list.
    pub fn creates_clip(&self) -> bool {
        matches!(self, EditAction::AddClip { .. } | EditAction::Split { .. })
    }
}

// --- PARSING ---

#[derive(Error, Debug)]
pub enum PlanParseError {
    #[error("Empty input")]
    EmptyInput,
    #[error("No JSON found in input")]
    NoJsonFound,
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses the outermost `{...}` in `raw`, so plans pasted with surrounding
/// prose or code fences still load.
pub fn parse_edit_plan(raw: &str) -> Result<EditPlan, PlanParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PlanParseError::EmptyInput);
    }

    let start = trimmed.find('{').ok_or(PlanParseError::NoJsonFound)?;
    let end = trimmed.rfind('}').ok_or(PlanParseError::NoJsonFound)?;
    if start > end {
        return Err(PlanParseError::NoJsonFound);
    }

    let plan: EditPlan = serde_json::from_str(&trimmed[start..=end])?;
    Ok(plan)
}
