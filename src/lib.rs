// Encore - live MIDI capture and timed playback
// Main library entry point

pub mod clock;
pub mod commands;
pub mod config;
pub mod devices;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod notifications;
pub mod playback;
pub mod recording;
pub mod runtime;
pub mod session;
pub mod timers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::playback::OutputChannel;

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "Capture live MIDI performances and play them back with their original timing")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Recording library file (overrides the configured path)
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `monitor`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List MIDI input and output ports
    Devices,

    /// Listen to an input, auto-record and play back interactively
    Monitor {
        /// Input port name
        #[arg(short, long)]
        input: Option<String>,

        /// Output port name
        #[arg(short, long)]
        output: Option<String>,

        /// Output channel: "default" or 0-15
        #[arg(short, long)]
        channel: Option<OutputChannel>,

        /// Start with auto-record turned off
        #[arg(long)]
        no_auto: bool,
    },

    /// List saved recordings
    List,

    /// Play a saved recording and exit when it ends
    Play {
        name: String,

        /// Output port name
        #[arg(short, long)]
        output: Option<String>,

        /// Output channel: "default" or 0-15
        #[arg(short, long)]
        channel: Option<OutputChannel>,
    },

    /// Write a saved recording to a Standard MIDI File
    Export {
        name: String,

        /// Destination (defaults to "<name>.mid" in the current directory)
        path: Option<PathBuf>,
    },

    /// Add a Standard MIDI File to the library
    Import {
        path: PathBuf,

        /// Library name (defaults to the file name without extension)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Rename a saved recording
    Rename { from: String, to: String },

    /// Delete a saved recording
    Delete { name: String },
}

/// Parse the command line and run the requested command
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = Config::load_or_default(&config_path);
    if let Some(library) = &cli.library {
        config.library_path = library.clone();
    }
    log::debug!("Using config {} and library {}", config_path.display(), config.library_path.display());

    match cli.command.unwrap_or(Commands::Monitor {
        input: None,
        output: None,
        channel: None,
        no_auto: false,
    }) {
        Commands::Devices => commands::list_devices(),
        Commands::Monitor { input, output, channel, no_auto } => {
            if input.is_some() {
                config.selected_input = input;
            }
            if output.is_some() {
                config.selected_output = output;
            }
            if let Some(channel) = channel {
                config.output_channel = channel;
            }
            if no_auto {
                config.auto_record = false;
            }
            let store = commands::open_store(&config.library_path);
            commands::monitor(config, &config_path, store)?;
        }
        Commands::List => {
            let store = commands::open_store(&config.library_path);
            commands::list_recordings(store.as_ref())?;
        }
        Commands::Play { name, output, channel } => {
            if output.is_some() {
                config.selected_output = output;
            }
            if let Some(channel) = channel {
                config.output_channel = channel;
            }
            let store = commands::open_store(&config.library_path);
            commands::play_recording(config, store, &name)?;
        }
        Commands::Export { name, path } => {
            let store = commands::open_store(&config.library_path);
            commands::export_recording(store.as_ref(), &name, path.as_deref())?;
        }
        Commands::Import { path, name } => {
            let store = commands::open_store(&config.library_path);
            commands::import_recording(store.as_ref(), &path, name)?;
        }
        Commands::Rename { from, to } => {
            let store = commands::open_store(&config.library_path);
            commands::rename_recording(store.as_ref(), &from, &to)?;
        }
        Commands::Delete { name } => {
            let store = commands::open_store(&config.library_path);
            commands::delete_recording(store.as_ref(), &name)?;
        }
    }

    Ok(())
}
