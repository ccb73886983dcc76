// src/preferences.rs
use crate::time::Time;
use crate::timeline::TrackKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- DATA STRUCTURES ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EditorPreferences {
    pub snap_enabled: bool,
    /// Seconds.
    pub grid_interval: f64,
    pub ripple_edit_enabled: bool,
    pub history_limit: Option<usize>,
    pub default_tracks: Vec<TrackKind>,
    pub ffprobe_path: Option<String>,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            snap_enabled: false,
            grid_interval: 1.0,
            ripple_edit_enabled: false,
            history_limit: None,
            default_tracks: vec![TrackKind::Video, TrackKind::Audio],
            ffprobe_path: None,
        }
    }
}

impl EditorPreferences {
    /// The grid as timeline time, or `None` if it is not a usable interval.
    pub fn grid_time(&self) -> Option<Time> {
        Time::try_from_secs(self.grid_interval).filter(|t| t.is_positive())
    }

    pub fn validate(&self) -> Result<(), PreferencesError> {
        if self.grid_time().is_none() {
            return Err(PreferencesError::Invalid(format!(
                "grid_interval must be a positive number of seconds, got {}",
                self.grid_interval
            )));
        }
        if self.history_limit == Some(0) {
            return Err(PreferencesError::Invalid(
                "history_limit must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies `CUTLINE_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), PreferencesError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CUTLINE_SNAP") {
            self.snap_enabled = parse_flag("CUTLINE_SNAP", &raw)?;
        }
        if let Some(raw) = lookup("CUTLINE_GRID_INTERVAL") {
            self.grid_interval = raw.trim().parse().map_err(|_| {
                PreferencesError::Invalid(format!("CUTLINE_GRID_INTERVAL: not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("CUTLINE_RIPPLE") {
            self.ripple_edit_enabled = parse_flag("CUTLINE_RIPPLE", &raw)?;
        }
        if let Some(raw) = lookup("CUTLINE_HISTORY_LIMIT") {
            let raw = raw.trim();
            self.history_limit = if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(raw.parse().map_err(|_| {
                    PreferencesError::Invalid(format!("CUTLINE_HISTORY_LIMIT: not a count: {raw}"))
                })?)
            };
        }
        if let Some(raw) = lookup("CUTLINE_FFPROBE") {
            let raw = raw.trim();
            self.ffprobe_path = (!raw.is_empty()).then(|| raw.to_string());
        }
        self.validate()
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, PreferencesError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PreferencesError::Invalid(format!("{key}: expected a boolean, got {other}"))),
    }
}

#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("Invalid preference: {0}")]
    Invalid(String),
    #[error("Failed to write preferences: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode preferences: {0}")]
    Json(#[from] serde_json::Error),
}

// --- MANAGER ---

pub struct PreferenceManager {
    preferences: EditorPreferences,
    file_path: Option<PathBuf>,
}

impl PreferenceManager {
    /// Loads `path`, falling back to defaults when the file is missing or
    /// unreadable, then applies `.env` and process environment overrides.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let file_path = path.as_ref().to_path_buf();
        let mut preferences = load_file(&file_path);

        // A missing .env is normal.
        dotenv::dotenv().ok();
        preferences.apply_overrides(|key| std::env::var(key).ok())?;

        log::info!("[prefs] loaded from {}", file_path.display());
        Ok(Self {
            preferences,
            file_path: Some(file_path),
        })
    }

    pub fn new_in_memory() -> Self {
        Self {
            preferences: EditorPreferences::default(),
            file_path: None,
        }
    }

    pub fn save(&self) -> Result<(), PreferencesError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.preferences)?;
        fs::write(path, json)?;
        log::debug!("[prefs] saved to {}", path.display());
        Ok(())
    }

    pub fn get_preferences(&self) -> &EditorPreferences {
        &self.preferences
    }

    pub fn update(&mut self, preferences: EditorPreferences) -> Result<(), PreferencesError> {
        preferences.validate()?;
        self.preferences = preferences;
        Ok(())
    }
}

fn load_file(path: &Path) -> EditorPreferences {
    if !path.exists() {
        return EditorPreferences::default();
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            serde_json::from_str::<EditorPreferences>(&content).map_err(|e| e.to_string())
        })
        .and_then(|prefs| prefs.validate().map(|_| prefs).map_err(|e| e.to_string()));
    match parsed {
        Ok(prefs) => prefs,
        Err(err) => {
            log::warn!("[prefs] ignoring {}: {}", path.display(), err);
            EditorPreferences::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let prefs = EditorPreferences::default();
        assert!(prefs.validate().is_ok());
        assert_eq!(prefs.grid_time(), Some(Time::from_whole_secs(1)));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let prefs: EditorPreferences = serde_json::from_str(r#"{"snap_enabled": true}"#).unwrap();
        assert!(prefs.snap_enabled);
        assert_eq!(prefs.grid_interval, 1.0);
        assert_eq!(prefs.default_tracks, vec![TrackKind::Video, TrackKind::Audio]);
    }

    #[test]
    fn test_env_overrides() {
        let mut prefs = EditorPreferences::default();
        prefs
            .apply_overrides(env(&[
                ("CUTLINE_SNAP", "on"),
                ("CUTLINE_GRID_INTERVAL", "0.5"),
                ("CUTLINE_HISTORY_LIMIT", "50"),
                ("CUTLINE_FFPROBE", "/usr/local/bin/ffprobe"),
            ]))
            .unwrap();
        assert!(prefs.snap_enabled);
        assert_eq!(prefs.grid_interval, 0.5);
        assert_eq!(prefs.history_limit, Some(50));
        assert_eq!(prefs.ffprobe_path.as_deref(), Some("/usr/local/bin/ffprobe"));
        assert!(!prefs.ripple_edit_enabled);
    }

    #[test]
    fn test_bad_overrides_rejected() {
        let mut prefs = EditorPreferences::default();
        assert!(matches!(
            prefs.apply_overrides(env(&[("CUTLINE_GRID_INTERVAL", "0")])),
            Err(PreferencesError::Invalid(_))
        ));
        let mut prefs = EditorPreferences::default();
        assert!(prefs.apply_overrides(env(&[("CUTLINE_RIPPLE", "maybe")])).is_err());
    }

    #[test]
    fn test_in_memory_manager() {
        let mut manager = PreferenceManager::new_in_memory();
        assert!(manager.save().is_ok());
        let bad = EditorPreferences {
            grid_interval: -1.0,
            ..EditorPreferences::default()
        };
        assert!(manager.update(bad).is_err());
        assert_eq!(manager.get_preferences(), &EditorPreferences::default());
    }
}
