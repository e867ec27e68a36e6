//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Execution lives in
//! [`crate::commands`].

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// RSCN Drivers CLI
#[derive(Parser, Debug)]
#[command(name = "rscnctl")]
#[command(about = "RSCN Drivers - GPU detection and driver management", long_about = None)]
#[command(version = env!("RSCN_VERSION"))]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Load configuration from this file instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Detect GPUs and show matching driver profiles
    Scan {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// List the driver profile catalog
    Profiles {
        /// Only this vendor (intel, amd, nvidia)
        #[arg(long)]
        vendor: Option<String>,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Install the packages of a driver profile
    Install {
        /// Profile id, e.g. "nvidia-proprietary"
        profile: String,

        /// Also install the profile's optional packages
        #[arg(long)]
        optional: bool,
    },

    /// Remove the packages of a driver profile
    Remove {
        /// Profile id, e.g. "nvidia-nouveau"
        profile: String,
    },

    /// Run a post-install maintenance step
    Fixup {
        #[arg(value_enum)]
        target: FixupTarget,
    },

    /// Show installed and repository versions of a package
    Package {
        name: String,
    },

    /// Show operation preconditions (lock, network, AUR helper, KMS hook)
    Status,
}

/// Post-install maintenance steps
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixupTarget {
    /// Remove the kms hook from mkinitcpio.conf
    KmsHook,
    /// Regenerate the initramfs images
    Initramfs,
    /// Regenerate grub.cfg
    Grub,
}
