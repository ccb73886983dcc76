// src/lib.rs

pub mod action_router;
pub mod commands;
pub mod edit_plan;
pub mod editing;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod preferences;
pub mod probe;
pub mod project;
pub mod snap;
pub mod time;
pub mod timeline;
pub mod validator;

pub use editing::AddClipRequest;
pub use engine::TimelineEngine;
pub use error::{EditError, EditResult};
pub use events::{TimelineEvent, TrimEdge};
pub use time::Time;

use clap::Parser;
use commands::{dispatch, Cli};

/// Entry point of the `cutline` binary.
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dispatch(Cli::parse())
}
