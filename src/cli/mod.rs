//! CLI module for toolpilot - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
