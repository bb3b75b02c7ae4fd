//! Command-line interface for jam-session
//!
//! Handles argument parsing and logging configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

/// jam-session - call-and-response improvisation against a backing track
#[derive(Parser, Debug)]
#[command(name = "jam-session")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity of jam-session itself
    /// -v = debug, -vv = trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Live session: listen, answer each phrase, export on Ctrl-C
    Jam {
        /// Input device name (default device when omitted)
        #[arg(short, long)]
        device: Option<String>,

        /// WAV file to play as the backing track
        #[arg(short, long, value_name = "WAV")]
        backtrack: Option<PathBuf>,

        /// Directory for the session exports (defaults to the data dir)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Print the notes extracted from a WAV file as JSON
    Extract {
        wav: PathBuf,

        /// Split the file into sound segments first and extract each one
        #[arg(long)]
        segments: bool,
    },

    /// Synthesize a JSON note list into a WAV file
    Render {
        notes: PathBuf,
        out: PathBuf,
    },

    /// Print backtrack metadata (tempo, duration) and check the length limit
    Probe { wav: PathBuf },
}

impl Args {
    /// Log level for this crate's modules, or `None` to leave it to `RUST_LOG`.
    pub fn log_level(&self) -> Option<LevelFilter> {
        if self.quiet {
            Some(LevelFilter::Error)
        } else {
            match self.verbose {
                0 => None,
                1 => Some(LevelFilter::Debug),
                _ => Some(LevelFilter::Trace),
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    // `info` unless RUST_LOG says otherwise
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(level) = args.log_level() {
        builder.filter_module("jam_session", level);
    }

    builder.format_timestamp_millis().init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(parse(&["jam-session", "jam"]).log_level(), None);
        assert_eq!(
            parse(&["jam-session", "-v", "jam"]).log_level(),
            Some(LevelFilter::Debug)
        );
        assert_eq!(
            parse(&["jam-session", "jam", "-vvv"]).log_level(),
            Some(LevelFilter::Trace)
        );
        assert_eq!(
            parse(&["jam-session", "-q", "-vv", "jam"]).log_level(),
            Some(LevelFilter::Error)
        );
    }

    #[test]
    fn jam_options() {
        let args = parse(&[
            "jam-session",
            "--config",
            "/tmp/s.toml",
            "jam",
            "--device",
            "USB Mic",
            "-b",
            "groove.wav",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/s.toml")));
        match args.command {
            Command::Jam {
                device,
                backtrack,
                out,
            } => {
                assert_eq!(device.as_deref(), Some("USB Mic"));
                assert_eq!(backtrack, Some(PathBuf::from("groove.wav")));
                assert_eq!(out, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn render_takes_two_paths() {
        match parse(&["jam-session", "render", "notes.json", "out.wav"]).command {
            Command::Render { notes, out } => {
                assert_eq!(notes, PathBuf::from("notes.json"));
                assert_eq!(out, PathBuf::from("out.wav"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Args::try_parse_from(["jam-session", "render", "notes.json"]).is_err());
    }

    #[test]
    fn extract_segments_flag() {
        match parse(&["jam-session", "extract", "take.wav", "--segments"]).command {
            Command::Extract { wav, segments } => {
                assert_eq!(wav, PathBuf::from("take.wav"));
                assert!(segments);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["jam-session"]).is_err());
    }
}
