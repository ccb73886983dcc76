// src/commands.rs
use crate::action_router::run_edit_plan;
use crate::edit_plan::parse_edit_plan;
use crate::editing::AddClipRequest;
use crate::engine::TimelineEngine;
use crate::error::seconds;
use crate::preferences::{EditorPreferences, PreferenceManager};
use crate::probe::{resolve_duration, FfprobeProbe};
use crate::project::{load_project, save_project};
use crate::time::format_timecode;
use crate::timeline::{TimelineState, TrackKind};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "cutline")]
#[command(version)]
#[command(about = "Edit multi-track timelines from the command line")]
pub struct Cli {
    /// Preferences file
    #[arg(long, global = true, default_value = "preferences.json")]
    pub prefs: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty project
    New {
        project: PathBuf,
        /// Comma-separated track kinds, e.g. video,video,audio
        #[arg(long, value_delimiter = ',')]
        tracks: Option<Vec<String>>,
    },
    /// Print the tracks and clips of a project
    Show {
        project: PathBuf,
        /// Print the raw timeline JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a media file to a track
    Import {
        project: PathBuf,
        media: String,
        /// Track index
        #[arg(long, default_value_t = 0)]
        track: usize,
        /// Start time in seconds (default: end of the track)
        #[arg(long)]
        at: Option<f64>,
        /// Clip length in seconds (default: probed)
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Run an edit plan against a project
    Apply {
        project: PathBuf,
        plan: PathBuf,
        /// Write the result here instead of over the project
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let prefs = PreferenceManager::new(&cli.prefs)
        .with_context(|| format!("loading preferences from {}", cli.prefs.display()))?;
    let prefs = prefs.get_preferences();

    match cli.command {
        Command::New { project, tracks } => new_project(&project, tracks, prefs),
        Command::Show { project, json } => show_project(&project, json),
        Command::Import {
            project,
            media,
            track,
            at,
            duration,
        } => import_media(&project, &media, track, at, duration, prefs),
        Command::Apply {
            project,
            plan,
            output,
        } => apply_plan(&project, &plan, output.as_deref(), prefs),
    }
}

fn open_engine(project: &Path, prefs: &EditorPreferences) -> Result<TimelineEngine> {
    let state = load_project(project).with_context(|| format!("opening {}", project.display()))?;
    let mut engine = TimelineEngine::from_state(state);
    engine.apply_preferences(prefs);
    Ok(engine)
}

pub fn new_project(project: &Path, tracks: Option<Vec<String>>, prefs: &EditorPreferences) -> Result<()> {
    if project.exists() {
        bail!("{} already exists", project.display());
    }
    let kinds = match tracks {
        Some(names) => names
            .iter()
            .map(|name| TrackKind::parse(name).ok_or_else(|| anyhow!("unknown track kind '{name}'")))
            .collect::<Result<Vec<_>>>()?,
        None => prefs.default_tracks.clone(),
    };

    let mut engine = TimelineEngine::with_preferences(prefs);
    for kind in kinds {
        engine.add_track(kind)?;
    }
    save_project(project, engine.state())?;
    println!("Created {} with {} tracks", project.display(), engine.tracks().len());
    Ok(())
}

pub fn show_project(project: &Path, json: bool) -> Result<()> {
    let state = load_project(project).with_context(|| format!("opening {}", project.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", summarize(&state));
    }
    Ok(())
}

pub fn summarize(state: &TimelineState) -> String {
    let mut out = format!(
        "Duration {}  Playhead {}\n",
        format_timecode(state.duration),
        format_timecode(state.playhead)
    );
    for track in &state.tracks {
        let mut flags = vec![];
        if track.flags.muted {
            flags.push("muted");
        }
        if track.flags.hidden {
            flags.push("hidden");
        }
        if track.flags.locked {
            flags.push("locked");
        }
        out.push_str(&format!(
            "[{}] {} ({} clips){}\n",
            track.order,
            track.name,
            track.clips.len(),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            }
        ));
        for clip in &track.clips {
            let marker = if clip.selected { '*' } else { ' ' };
            out.push_str(&format!(
                "  {marker} {} - {}  {}  {}\n",
                format_timecode(clip.start_time),
                format_timecode(clip.end_time()),
                clip.name,
                clip.id
            ));
        }
    }
    out
}

pub fn import_media(
    project: &Path,
    media: &str,
    track: usize,
    at: Option<f64>,
    duration: Option<f64>,
    prefs: &EditorPreferences,
) -> Result<()> {
    let mut engine = open_engine(project, prefs)?;
    let target = engine
        .tracks()
        .get(track)
        .ok_or_else(|| anyhow!("track index {track} out of range (0..{})", engine.tracks().len()))?;
    let track_id = target.id;
    let start = match at {
        Some(at) => seconds(at, "--at")?,
        None => target.end_time().unwrap_or_default(),
    };
    let duration = match duration {
        Some(d) => seconds(d, "--duration")?,
        None => {
            let probe = FfprobeProbe::new(prefs.ffprobe_path.clone());
            resolve_duration(&probe, media)
        }
    };

    let clip_id = engine.add_clip(AddClipRequest::new(track_id, media, start, duration))?;
    save_project(project, engine.state())?;
    if let Some(clip) = engine.clip(clip_id) {
        println!(
            "Imported {} at {} ({}). Duration: {}",
            clip.name,
            format_timecode(clip.start_time),
            clip.duration,
            format_timecode(engine.duration())
        );
    }
    Ok(())
}

pub fn apply_plan(project: &Path, plan: &Path, output: Option<&Path>, prefs: &EditorPreferences) -> Result<()> {
    let mut engine = open_engine(project, prefs)?;
    let raw = fs::read_to_string(plan).with_context(|| format!("reading {}", plan.display()))?;
    let plan = parse_edit_plan(&raw).context("parsing edit plan")?;

    let report = run_edit_plan(&mut engine, &plan)?;
    let destination = output.unwrap_or(project);
    save_project(destination, engine.state())?;
    println!(
        "Applied {} actions ({} clips created). Duration: {}. Saved to {}",
        report.applied,
        report.created_clips.len(),
        format_timecode(report.duration),
        destination.display()
    );
    Ok(())
}
