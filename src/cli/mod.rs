//! CLI module for command-line interface

pub mod commands;

pub use commands::*;
