use anyhow::{Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use move_voice::cli::{Args, Command};
use move_voice::config::VoiceSettings;
use move_voice::runtime;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,move_voice=info")
        }))
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }

    let settings = VoiceSettings::from_args(&args)?;
    match &args.cmd {
        Some(Command::Say { priority, ids }) => runtime::run_say(&settings, *priority, ids),
        Some(Command::Listen) => runtime::run_listen(&settings, true),
        None => Err(anyhow!("no command given (try `say` or `listen`)")),
    }
}
