//! CLI module for the expression analyser
//!
//! Handles command-line argument parsing and terminal formatting.

pub mod args;
pub mod display;

pub use args::{Args, Commands, SettingsCommand, Verbosity};
