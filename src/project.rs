// src/project.rs
use crate::error::IntegrityError;
use crate::timeline::TimelineState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const PROJECT_VERSION: u32 = 1;

/// On-disk project. Undo history is not stored: a reload starts
/// with empty stacks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectFile {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub timeline: TimelineState,
}

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Project JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported project version {found} (expected {})", PROJECT_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("Project is inconsistent: {0}")]
    Integrity(#[from] IntegrityError),
}

pub fn to_json(state: &TimelineState) -> Result<String, ProjectError> {
    let file = ProjectFile {
        version: PROJECT_VERSION,
        saved_at: Utc::now(),
        timeline: state.clone(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parses and checks a project. A file that would break the engine's
/// invariants is refused rather than repaired.
pub fn from_json(raw: &str) -> Result<TimelineState, ProjectError> {
    let file: ProjectFile = serde_json::from_str(raw)?;
    if file.version != PROJECT_VERSION {
        return Err(ProjectError::UnsupportedVersion {
            found: file.version,
        });
    }
    let mut state = file.timeline;
    state.verify_integrity()?;
    state.clamp_playhead();
    Ok(state)
}

pub fn save_project(path: impl AsRef<Path>, state: &TimelineState) -> Result<(), ProjectError> {
    let path = path.as_ref();
    fs::write(path, to_json(state)?)?;
    log::info!(
        "[project] saved {} ({} tracks, {} clips)",
        path.display(),
        state.tracks.len(),
        state.clip_count()
    );
    Ok(())
}

pub fn load_project(path: impl AsRef<Path>) -> Result<TimelineState, ProjectError> {
    let path = path.as_ref();
    let state = from_json(&fs::read_to_string(path)?)?;
    log::info!(
        "[project] loaded {} ({} tracks, {} clips)",
        path.display(),
        state.tracks.len(),
        state.clip_count()
    );
    Ok(state)
}
