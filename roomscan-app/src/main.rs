//! Roomscan Application
//!
//! Drives a full room-scanning session: sensor frames in, tracking, keyframe
//! admission, background finalization, and the live preview texture
//! pipeline.
//!
//! Without a recorded session directory the app runs against the synthetic
//! sensor, which is enough to exercise every capture state.

mod app;
mod sim;

use clap::Parser;
use std::path::PathBuf;

/// Roomscan - Room Scanning Capture and Finalization
#[derive(Parser, Debug)]
#[command(name = "roomscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON scan options file
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Replay a recorded session directory instead of the synthetic sensor
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Number of frames to scan before finishing (synthetic sensor)
    #[arg(short, long, default_value_t = 240)]
    frames: u64,

    /// Skip the GPU preview pipeline
    #[arg(long)]
    no_preview: bool,
}

fn main() {
    let args = Args::parse();

    let config = app::RunConfig {
        options_path: args.options,
        replay_dir: args.replay,
        frame_budget: args.frames,
        preview: !args.no_preview,
    };

    if let Err(e) = app::run(config) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
