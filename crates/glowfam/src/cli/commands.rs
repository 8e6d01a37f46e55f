//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::camera::CameraFacing;
use crate::controller::MeasurementContext;

/// Measure command arguments.
#[derive(Debug, Args)]
pub struct MeasureCommand {
    /// Height of the adult in the photo, in centimeters
    #[arg(short, long, value_name = "CM")]
    pub reference: String,

    /// Wait for the countdown before taking the photo
    #[arg(short, long)]
    pub timer: bool,

    /// Lens to take the photo with
    #[arg(long, value_enum)]
    pub lens: Option<LensArg>,

    /// Shorthand for `--lens front`
    #[arg(long, conflicts_with = "lens")]
    pub front: bool,

    /// Child profile to save the measurement for
    #[arg(short, long, value_name = "KID_INFO_NO")]
    pub kid: Option<u64>,

    /// Family the child belongs to
    #[arg(long, value_name = "FAMILY_NO")]
    pub family: Option<u64>,

    /// Save the measurement to the child's profile
    #[arg(long, requires = "kid")]
    pub save: bool,

    /// Save the annotated image to the photo library
    #[arg(long)]
    pub save_image: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl MeasureCommand {
    /// Lens requested on the command line, if any.
    #[must_use]
    pub fn facing(&self) -> Option<CameraFacing> {
        if self.front {
            Some(CameraFacing::Front)
        } else {
            self.lens.map(CameraFacing::from)
        }
    }

    /// Who the measurement is for.
    #[must_use]
    pub fn context(&self) -> MeasurementContext {
        MeasurementContext {
            kid_info_no: self.kid,
            family_no: self.family,
        }
    }
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Family whose measurements to list
    #[arg(short, long, value_name = "FAMILY_NO")]
    pub family: u64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Tilt command arguments.
#[derive(Debug, Args)]
pub struct TiltCommand {
    /// Number of readings to print before exiting
    #[arg(short = 'n', long, default_value = "10")]
    pub samples: usize,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Lens argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LensArg {
    /// Rear camera
    Back,
    /// Selfie camera
    Front,
}

impl From<LensArg> for CameraFacing {
    fn from(arg: LensArg) -> Self {
        match arg {
            LensArg::Back => Self::Back,
            LensArg::Front => Self::Front,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure() -> MeasureCommand {
        MeasureCommand {
            reference: "175".to_string(),
            timer: false,
            lens: None,
            front: false,
            kid: Some(7),
            family: Some(3),
            save: false,
            save_image: false,
            json: false,
        }
    }

    #[test]
    fn test_lens_arg_conversion() {
        assert_eq!(CameraFacing::from(LensArg::Back), CameraFacing::Back);
        assert_eq!(CameraFacing::from(LensArg::Front), CameraFacing::Front);
    }

    #[test]
    fn test_measure_facing() {
        let mut cmd = measure();
        assert_eq!(cmd.facing(), None);
        cmd.lens = Some(LensArg::Back);
        assert_eq!(cmd.facing(), Some(CameraFacing::Back));
        cmd.lens = None;
        cmd.front = true;
        assert_eq!(cmd.facing(), Some(CameraFacing::Front));
    }

    #[test]
    fn test_measure_context() {
        let ctx = measure().context();
        assert_eq!(ctx.kid_info_no, Some(7));
        assert_eq!(ctx.family_no, Some(3));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
