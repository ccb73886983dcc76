// src/probe.rs
//
// Picks a default clip length for media whose duration the caller does not
// know. Probing never blocks an add: any failure falls back to a fixed
// duration per media kind.

use crate::time::Time;
use crate::timeline::MIN_DURATION;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

const HOMEBREW_FFPROBE: &str = "/opt/homebrew/bin/ffprobe";

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Seconds.
    pub duration: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub codec: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },
    #[error("ffprobe failed: {0}")]
    Failed(String),
    #[error("Failed to parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not find duration in ffprobe output")]
    MissingDuration,
}

pub trait MediaProbe {
    fn probe(&self, source_path: &str) -> Result<MediaInfo, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" => MediaKind::Audio,
            "png" | "jpg" | "jpeg" | "bmp" | "gif" | "webp" => MediaKind::Image,
            _ => MediaKind::Video,
        }
    }
}

pub fn fallback_duration(kind: MediaKind) -> Time {
    match kind {
        MediaKind::Video => Time::from_whole_secs(10),
        MediaKind::Audio => Time::from_whole_secs(30),
        MediaKind::Image => Time::from_whole_secs(5),
    }
}

/// The probed duration of `path`, or the fallback for its kind when the probe
/// fails or reports less than the minimum clip duration.
pub fn resolve_duration(probe: &dyn MediaProbe, path: &str) -> Time {
    let fallback = fallback_duration(MediaKind::from_path(path));
    match probe.probe(path) {
        Ok(info) => match Time::try_from_secs(info.duration).filter(|t| *t >= MIN_DURATION) {
            Some(duration) => duration,
            None => {
                log::warn!(
                    "[probe] {} reported duration {}, using {}",
                    path,
                    info.duration,
                    fallback
                );
                fallback
            }
        },
        Err(err) => {
            log::warn!("[probe] {}: {}, using {}", path, err, fallback);
            fallback
        }
    }
}

// --- FFPROBE ---

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Runs the `ffprobe` binary as a child process.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProbe {
    binary: Option<String>,
}

impl FfprobeProbe {
    pub fn new(binary: Option<String>) -> Self {
        Self { binary }
    }

    fn run(&self, binary: &str, path: &str) -> Result<MediaInfo, ProbeError> {
        log::debug!("[probe] trying ffprobe at {}", binary);
        let output = Command::new(binary)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_name,width,height,r_frame_rate",
                "-of",
                "json",
                path,
            ])
            .output()
            .map_err(|source| ProbeError::Spawn {
                binary: binary.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, source_path: &str) -> Result<MediaInfo, ProbeError> {
        let primary = self.binary.as_deref().unwrap_or("ffprobe");
        match self.run(primary, source_path) {
            Ok(info) => Ok(info),
            // Only a missing binary is worth a second attempt.
            Err(ProbeError::Spawn { .. }) if primary != HOMEBREW_FFPROBE => {
                self.run(HOMEBREW_FFPROBE, source_path)
            }
            Err(err) => Err(err),
        }
    }
}

pub fn parse_ffprobe_output(raw: &str) -> Result<MediaInfo, ProbeError> {
    let parsed: FfprobeOutput = serde_json::from_str(raw)?;
    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or(ProbeError::MissingDuration)?;

    let visual = parsed.streams.iter().find(|s| s.width.is_some());
    Ok(MediaInfo {
        duration,
        width: visual.and_then(|s| s.width),
        height: visual.and_then(|s| s.height),
        frame_rate: visual
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_rate),
        codec: visual
            .or(parsed.streams.first())
            .and_then(|s| s.codec_name.clone()),
    })
}

/// `"30000/1001"` or `"25"`; `None` for `"0/0"` and garbage.
fn parse_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Result<f64, ()>);

    impl MediaProbe for FixedProbe {
        fn probe(&self, _source_path: &str) -> Result<MediaInfo, ProbeError> {
            match self.0 {
                Ok(duration) => Ok(MediaInfo {
                    duration,
                    width: None,
                    height: None,
                    frame_rate: None,
                    codec: None,
                }),
                Err(()) => Err(ProbeError::MissingDuration),
            }
        }
    }

    #[test]
    fn test_parse_ffprobe_json() {
        let raw = r#"{
            "streams": [
                {"codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"},
                {"codec_name": "aac", "r_frame_rate": "0/0"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let info = parse_ffprobe_output(raw).unwrap();
        assert_eq!(info.duration, 12.48);
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.codec.as_deref(), Some("h264"));
        let fps = info.frame_rate.unwrap();
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_audio_only() {
        let raw = r#"{"streams":[{"codec_name":"mp3"}],"format":{"duration":"3.5"}}"#;
        let info = parse_ffprobe_output(raw).unwrap();
        assert_eq!(info.width, None);
        assert_eq!(info.codec.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_missing_duration() {
        let raw = r#"{"streams":[],"format":{}}"#;
        assert!(matches!(parse_ffprobe_output(raw), Err(ProbeError::MissingDuration)));
    }

    #[test]
    fn test_media_kind_by_extension() {
        assert_eq!(MediaKind::from_path("a/b/song.MP3"), MediaKind::Audio);
        assert_eq!(MediaKind::from_path("still.jpeg"), MediaKind::Image);
        assert_eq!(MediaKind::from_path("clip.mov"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("noext"), MediaKind::Video);
    }

    #[test]
    fn test_resolve_falls_back() {
        assert_eq!(
            resolve_duration(&FixedProbe(Ok(4.25)), "a.mp4"),
            Time::from_secs(4.25)
        );
        assert_eq!(
            resolve_duration(&FixedProbe(Err(())), "a.wav"),
            Time::from_whole_secs(30)
        );
        assert_eq!(
            resolve_duration(&FixedProbe(Ok(0.0)), "a.png"),
            Time::from_whole_secs(5)
        );
        assert_eq!(
            resolve_duration(&FixedProbe(Ok(0.05)), "a.mp4"),
            Time::from_whole_secs(10)
        );
    }
}
