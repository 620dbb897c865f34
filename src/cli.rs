//! Command-line interface.
//!
//! Handles argument parsing and logging configuration.  One binary, three
//! modes: `once` (single utterance), `listen` (continuous console), `gui`
//! (desktop window, the default).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// Live microphone transcription via a cloud speech API
#[derive(Parser, Debug)]
#[command(name = "live-transcribe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace, -vvvv = all deps
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub mode: Option<Mode>,
}

/// Run modes; `gui` is the default when no subcommand is given.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Mode {
    /// Capture one utterance, print its transcript, and exit
    Once {
        /// Also write the captured audio to a WAV file
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
    /// Transcribe continuously on the console until Ctrl-C
    Listen,
    /// Open the desktop window
    Gui,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    // Our own modules at the requested verbosity level
    builder.filter_module("live_transcribe", args.log_level());

    // Dependency internals (cpal, reqwest, eframe) only at -vvvv
    if args.verbose >= 4 {
        builder.filter_level(args.log_level());
    }

    builder.format_timestamp_millis().init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
