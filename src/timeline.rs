// src/timeline.rs
use crate::error::IntegrityError;
use crate::time::Time;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

// 1. CONSTANTS
pub const MIN_DURATION: Time = Time::from_millis(100);
pub const EMPTY_TIMELINE_DURATION: Time = Time::from_whole_secs(60);
pub const DURATION_PADDING: Time = Time::from_whole_secs(30);
pub const DEFAULT_GRID_INTERVAL: Time = Time::from_whole_secs(1);
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 100.0;

// 2. IDS
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClipId(pub Uuid);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// 3. CLOSED VARIANTS
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Title,
    Effects,
    Adjustment,
}

impl TrackKind {
    pub fn label(self) -> &'static str {
        match self {
            TrackKind::Video => "Video",
            TrackKind::Audio => "Audio",
            TrackKind::Title => "Title",
            TrackKind::Effects => "Effects",
            TrackKind::Adjustment => "Adjustment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "video" | "v" => Some(TrackKind::Video),
            "audio" | "a" => Some(TrackKind::Audio),
            "title" | "t" => Some(TrackKind::Title),
            "effects" | "fx" => Some(TrackKind::Effects),
            "adjustment" | "adj" => Some(TrackKind::Adjustment),
            _ => None,
        }
    }

    /// Audio lanes never composite, so they carry no blend state.
    pub fn is_visual(self) -> bool {
        match self {
            TrackKind::Video | TrackKind::Title | TrackKind::Effects | TrackKind::Adjustment => true,
            TrackKind::Audio => false,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Add,
    Subtract,
    Darken,
    Lighten,
    Difference,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputRoute {
    #[default]
    Master,
    Monitor,
    Stem,
    Disabled,
}

// 4. CLIP
/// The four values that fix where a clip sits and which source range it plays.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ClipSpan {
    pub start_time: Time,
    pub duration: Time,
    pub source_in: Time,
    pub source_out: Time,
}

impl ClipSpan {
    pub fn end_time(&self) -> Time {
        self.start_time + self.duration
    }
}

/// Fade lengths at either end of a clip.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Fades {
    pub fade_in: Time,
    pub fade_out: Time,
}

impl Fades {
    /// Shortens the fades so that together they fit in `duration`, taking
    /// from the fade out first.
    pub fn fit(self, duration: Time) -> Fades {
        let fade_in = self.fade_in.min(duration);
        Fades {
            fade_in,
            fade_out: self.fade_out.min(duration - fade_in),
        }
    }
}

/// Cosmetic and mixing attributes a user edits from the inspector.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClipAttributes {
    pub name: String,
    pub gain: f64,
    pub fade_in: Time,
    pub fade_out: Time,
    pub freeze_frame: bool,
    pub freeze_offset: Time,
    pub transition_in: Option<String>,
    pub transition_out: Option<String>,
    pub color: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub source_path: String,
    pub start_time: Time,
    pub duration: Time,
    pub source_in: Time,
    pub source_out: Time,
    pub source_duration: Time,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub selected: bool,
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(default)]
    pub fade_in: Time,
    #[serde(default)]
    pub fade_out: Time,
    #[serde(default)]
    pub freeze_frame: bool,
    #[serde(default)]
    pub freeze_offset: Time,
    #[serde(default)]
    pub transition_in: Option<String>,
    #[serde(default)]
    pub transition_out: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_speed() -> f64 {
    1.0
}

fn default_gain() -> f64 {
    1.0
}

impl Clip {
    pub fn end_time(&self) -> Time {
        self.start_time + self.duration
    }

    pub fn span(&self) -> ClipSpan {
        ClipSpan {
            start_time: self.start_time,
            duration: self.duration,
            source_in: self.source_in,
            source_out: self.source_out,
        }
    }

    pub fn set_span(&mut self, span: ClipSpan) {
        self.start_time = span.start_time;
        self.duration = span.duration;
        self.source_in = span.source_in;
        self.source_out = span.source_out;
    }

    pub fn fades(&self) -> Fades {
        Fades {
            fade_in: self.fade_in,
            fade_out: self.fade_out,
        }
    }

    pub fn set_fades(&mut self, fades: Fades) {
        self.fade_in = fades.fade_in;
        self.fade_out = fades.fade_out;
    }

    pub fn attributes(&self) -> ClipAttributes {
        ClipAttributes {
            name: self.name.clone(),
            gain: self.gain,
            fade_in: self.fade_in,
            fade_out: self.fade_out,
            freeze_frame: self.freeze_frame,
            freeze_offset: self.freeze_offset,
            transition_in: self.transition_in.clone(),
            transition_out: self.transition_out.clone(),
            color: self.color.clone(),
        }
    }

    pub fn set_attributes(&mut self, attrs: ClipAttributes) {
        self.name = attrs.name;
        self.gain = attrs.gain;
        self.fade_in = attrs.fade_in;
        self.fade_out = attrs.fade_out;
        self.freeze_frame = attrs.freeze_frame;
        self.freeze_offset = attrs.freeze_offset;
        self.transition_in = attrs.transition_in;
        self.transition_out = attrs.transition_out;
        self.color = attrs.color;
    }

    /// Half-open containment: a clip owns its start instant but not its end.
    pub fn contains(&self, time: Time) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    pub fn overlaps(&self, start: Time, end: Time) -> bool {
        self.start_time < end && start < self.end_time()
    }
}

// 5. TRACK
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrackFlags {
    pub muted: bool,
    pub hidden: bool,
    pub locked: bool,
    pub opacity: f64,
    pub blend_mode: BlendMode,
    pub output_route: OutputRoute,
}

impl Default for TrackFlags {
    fn default() -> Self {
        Self {
            muted: false,
            hidden: false,
            locked: false,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            output_route: OutputRoute::Master,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    pub order: usize,
    #[serde(flatten)]
    pub flags: TrackFlags,
    pub clips: Vec<Clip>,
}

impl Track {
    pub fn new(kind: TrackKind, name: String, order: usize) -> Self {
        Self {
            id: TrackId::new(),
            name,
            kind,
            order,
            flags: TrackFlags::default(),
            clips: vec![],
        }
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub fn position(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    /// First clip other than `ignore` whose interval intersects `[start, end)`.
    pub fn first_overlap(&self, start: Time, end: Time, ignore: Option<ClipId>) -> Option<&Clip> {
        self.clips
            .iter()
            .filter(|c| Some(c.id) != ignore)
            .find(|c| c.overlaps(start, end))
    }

    /// Inserts keeping clips sorted by start time. Returns the index used.
    pub fn insert_sorted(&mut self, clip: Clip) -> usize {
        let index = self
            .clips
            .partition_point(|c| c.start_time <= clip.start_time);
        self.clips.insert(index, clip);
        index
    }

    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.position(id)?;
        Some(self.clips.remove(index))
    }

    /// End of the closest clip that finishes at or before `time`, ignoring `ignore`.
    pub fn previous_end(&self, time: Time, ignore: ClipId) -> Option<Time> {
        self.clips
            .iter()
            .filter(|c| c.id != ignore && c.end_time() <= time)
            .map(Clip::end_time)
            .max()
    }

    /// Start of the closest clip that begins at or after `time`, ignoring `ignore`.
    pub fn next_start(&self, time: Time, ignore: ClipId) -> Option<Time> {
        self.clips
            .iter()
            .filter(|c| c.id != ignore && c.start_time >= time)
            .map(|c| c.start_time)
            .min()
    }

    pub fn end_time(&self) -> Option<Time> {
        self.clips.iter().map(Clip::end_time).max()
    }
}

// 6. TIMELINE
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TimelineState {
    pub tracks: Vec<Track>,
    pub playhead: Time,
    pub duration: Time,
    #[serde(default)]
    pub in_point: Option<Time>,
    #[serde(default)]
    pub out_point: Option<Time>,
    #[serde(default)]
    pub loop_start: Option<Time>,
    #[serde(default)]
    pub loop_end: Option<Time>,
    #[serde(default)]
    pub selected_clip: Option<ClipId>,
    pub snap_enabled: bool,
    pub grid_interval: Time,
    pub ripple_edit_enabled: bool,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self {
            tracks: vec![],
            playhead: Time::ZERO,
            duration: EMPTY_TIMELINE_DURATION,
            in_point: None,
            out_point: None,
            loop_start: None,
            loop_end: None,
            selected_clip: None,
            snap_enabled: false,
            grid_interval: DEFAULT_GRID_INTERVAL,
            ripple_edit_enabled: false,
        }
    }
}

impl TimelineState {
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Returns (track index, clip index) of the clip.
    pub fn locate(&self, id: ClipId) -> Option<(usize, usize)> {
        self.tracks
            .iter()
            .enumerate()
            .find_map(|(ti, t)| t.position(id).map(|ci| (ti, ci)))
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.tracks.iter().find_map(|t| t.clip(id))
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.tracks.iter_mut().find_map(|t| t.clip_mut(id))
    }

    pub fn track_of(&self, id: ClipId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.position(id).is_some())
    }

    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }

    /// Longest clip end across every track, or the empty floor.
    pub fn content_duration(&self) -> Time {
        self.tracks
            .iter()
            .filter_map(Track::end_time)
            .max()
            .unwrap_or(EMPTY_TIMELINE_DURATION)
    }

    pub fn renumber_tracks(&mut self) {
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.order = i;
        }
    }

    /// Sets the exclusive selection and keeps every clip's flag in agreement.
    pub fn set_selection(&mut self, id: Option<ClipId>) {
        let id = id.filter(|id| self.clip(*id).is_some());
        for clip in self.tracks.iter_mut().flat_map(|t| t.clips.iter_mut()) {
            clip.selected = Some(clip.id) == id;
        }
        self.selected_clip = id;
    }

    pub fn clamp_playhead(&mut self) {
        self.playhead = self.playhead.clamp(Time::ZERO, self.duration.max(Time::ZERO));
    }

    /// Walks every structural and value invariant of the model.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        if !self.grid_interval.is_positive() {
            return Err(IntegrityError::GridInterval(self.grid_interval));
        }
        for (what, start, end) in [
            ("in/out", self.in_point, self.out_point),
            ("loop", self.loop_start, self.loop_end),
        ] {
            let negative = [start, end].into_iter().flatten().any(Time::is_negative);
            let inverted = matches!((start, end), (Some(s), Some(e)) if s > e);
            if negative || inverted {
                return Err(IntegrityError::Markers(what));
            }
        }
        let mut seen = HashSet::new();
        for (i, track) in self.tracks.iter().enumerate() {
            if track.order != i {
                return Err(IntegrityError::TrackOrder);
            }
            if !(0.0..=1.0).contains(&track.flags.opacity) {
                return Err(IntegrityError::Opacity(track.id));
            }
            if !seen.insert(track.id.0) {
                return Err(IntegrityError::DuplicateId(track.id.to_string()));
            }
            for clip in &track.clips {
                if !seen.insert(clip.id.0) {
                    return Err(IntegrityError::DuplicateId(clip.id.to_string()));
                }
                if !clip.duration.is_positive() {
                    return Err(IntegrityError::EmptyClip(clip.id));
                }
                if clip.start_time.is_negative() || clip.start_time > clip.end_time() {
                    return Err(IntegrityError::NegativeSpan(clip.id));
                }
                if !(Time::ZERO <= clip.source_in
                    && clip.source_in <= clip.source_out
                    && clip.source_out <= clip.source_duration)
                {
                    return Err(IntegrityError::SourceBounds(clip.id));
                }
                if !(MIN_SPEED..=MAX_SPEED).contains(&clip.speed) {
                    return Err(IntegrityError::Speed(clip.id));
                }
                if clip.fade_in.is_negative()
                    || clip.fade_out.is_negative()
                    || clip.fade_in + clip.fade_out > clip.duration
                {
                    return Err(IntegrityError::Fades(clip.id));
                }
                if clip.selected != (self.selected_clip == Some(clip.id)) {
                    return Err(IntegrityError::SelectionMismatch(clip.id));
                }
            }
            for pair in track.clips.windows(2) {
                if pair[0].start_time > pair[1].start_time {
                    return Err(IntegrityError::Unsorted(track.id));
                }
                if pair[0].end_time() > pair[1].start_time {
                    return Err(IntegrityError::Overlap(pair[0].id, pair[1].id));
                }
            }
        }
        if let Some(id) = self.selected_clip {
            if self.clip(id).is_none() {
                return Err(IntegrityError::DanglingSelection(id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn secs(value: f64) -> Time {
        Time::from_secs(value)
    }

    pub fn clip(start: f64, duration: f64) -> Clip {
        let duration = secs(duration);
        Clip {
            id: ClipId::new(),
            name: "clip".to_string(),
            source_path: "clip.mp4".to_string(),
            start_time: secs(start),
            duration,
            source_in: Time::ZERO,
            source_out: duration,
            source_duration: duration,
            speed: 1.0,
            selected: false,
            gain: 1.0,
            fade_in: Time::ZERO,
            fade_out: Time::ZERO,
            freeze_frame: false,
            freeze_offset: Time::ZERO,
            transition_in: None,
            transition_out: None,
            color: None,
        }
    }
}
