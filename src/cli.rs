//! Command-line flags (§6): the input program, an optional fixed running
//! time, an optional WAV export path, and a mono-downmix switch. Argument
//! errors are reported before any file I/O is attempted.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{OrganicError, OrganicResult};

/// Plays (or renders) a compiled Organic program.
#[derive(Parser, Debug)]
#[command(name = "organic", version, about = "An Organic audio-synthesis interpreter")]
pub struct Cli {
    /// Path to the `.organic` program to run.
    pub program: PathBuf,

    /// Stop after this many seconds instead of running until the program's
    /// graph goes idle.
    #[arg(short = 't', long = "time")]
    pub time: Option<f64>,

    /// Render offline to this WAV file instead of opening a realtime
    /// output device. Requires `--time`.
    #[arg(long = "export")]
    pub export: Option<PathBuf>,

    /// Downmix to a single channel instead of stereo.
    #[arg(long = "mono")]
    pub mono: bool,
}

impl Cli {
    pub fn parse_args() -> OrganicResult<Self> {
        let cli = Self::try_parse().map_err(|e| OrganicError::Argument(e.to_string()))?;
        cli.validate()?;
        Ok(cli)
    }

    fn validate(&self) -> OrganicResult<()> {
        if let Some(time) = self.time {
            if !time.is_finite() || time <= 0.0 {
                return Err(OrganicError::Argument(format!("--time must be a positive number, got {time}")));
            }
        }
        if self.export.is_some() && self.time.is_none() {
            return Err(OrganicError::Argument("--export requires --time to be set".to_string()));
        }
        Ok(())
    }

    pub fn channels(&self) -> u32 {
        if self.mono {
            1
        } else {
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_without_time_is_rejected() {
        let cli = Cli {
            program: PathBuf::from("main.organic"),
            time: None,
            export: Some(PathBuf::from("out.wav")),
            mono: false,
        };
        assert!(cli.validate().is_err());
    }

    #[test]
    fn zero_or_negative_time_is_rejected() {
        let cli = Cli { program: PathBuf::from("main.organic"), time: Some(0.0), export: None, mono: false };
        assert!(cli.validate().is_err());
        let cli = Cli { program: PathBuf::from("main.organic"), time: Some(-1.0), export: None, mono: false };
        assert!(cli.validate().is_err());
    }

    #[test]
    fn mono_selects_a_single_channel() {
        let cli = Cli { program: PathBuf::from("main.organic"), time: None, export: None, mono: true };
        assert_eq!(cli.channels(), 1);
        let cli = Cli { program: PathBuf::from("main.organic"), time: None, export: None, mono: false };
        assert_eq!(cli.channels(), 2);
    }

    #[test]
    fn plain_invocation_with_a_time_bound_is_accepted() {
        let cli = Cli { program: PathBuf::from("main.organic"), time: Some(5.0), export: None, mono: false };
        assert!(cli.validate().is_ok());
    }
}
