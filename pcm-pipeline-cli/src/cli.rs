//! Argument parsing and logging setup for `pcmctl`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use pcm_pipeline_core::BUFFER_SIZE;

/// Record, play and manage mono 16-bit PCM recordings on the virtual device
#[derive(Parser, Debug)]
#[command(name = "pcmctl")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture from the virtual input and write a WAV file
    Record {
        output: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
        /// Sine tone frequency in Hz; silence when omitted
        #[arg(long)]
        tone: Option<f64>,
        #[arg(long, default_value_t = BUFFER_SIZE)]
        buffer_size: usize,
        /// Pace buffers at the sample rate instead of pumping them at once
        #[arg(long)]
        realtime: bool,
    },
    /// Stream a WAV file to the virtual output
    Play {
        input: PathBuf,
        #[arg(long, default_value_t = BUFFER_SIZE)]
        buffer_size: usize,
        #[arg(long)]
        realtime: bool,
    },
    /// Print the header of a WAV file
    Inspect { file: PathBuf },
    /// List recordings with metadata sidecars, newest first
    List {
        #[arg(long, default_value = "recordings")]
        dir: PathBuf,
    },
    /// Delete a recording and its sidecar
    Delete {
        id: String,
        #[arg(long, default_value = "recordings")]
        dir: PathBuf,
    },
}

impl Args {
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

pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("pcm_pipeline_core", args.log_level());
    builder.filter_module("pcmctl", args.log_level());
    builder.format_timestamp_millis().init();
}
