//! Command-line interface
//!
//! Argument definitions live in [`args`]; [`commands`] routes a parsed
//! invocation to its handler.

pub mod args;
pub mod commands;
