use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "move-voice", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Optional TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Base path prepended to clip ids (e.g. `mp3/`)
    #[arg(long)]
    pub clips_dir: Option<String>,

    /// Clip file extension, without the dot
    #[arg(long)]
    pub extension: Option<String>,

    /// Playback volume in [0, 1]
    #[arg(long)]
    pub volume: Option<f32>,

    /// POST interaction prompts to this URL instead of logging them
    #[arg(long)]
    pub notify_url: Option<String>,

    /// Resampler input chunk size in frames
    #[arg(long)]
    pub chunk_frames: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play one event made of the given clip ids and exit when done
    Say {
        /// Event priority (higher cuts off weaker queued events)
        #[arg(long)]
        priority: Option<i32>,

        /// Clip ids, e.g. `piece/knight square/f3`
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Read events from stdin, one per line (`[priority:]id id ...`)
    Listen,
}
