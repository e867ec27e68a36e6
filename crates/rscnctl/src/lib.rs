//! RSCN Control - command-line front end for RSCN Drivers
//!
//! The binary is a thin shell over this library so argument parsing and
//! rendering can be tested without spawning the process.

pub mod cli;
pub mod commands;
pub mod output;

pub use commands::CommandStatus;
