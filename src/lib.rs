//! Local file deployment engine.
//!
//! Copies a list of source files into resolved target directories on the
//! local filesystem in two passes: a scan that resolves every target and
//! settles conflicts with existing files through a replace policy, and an
//! execute pass that copies or skips each file while reporting progress
//! scaled to a fixed 1000-unit range.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: load and validate the TOML deploy manifest
//! - **[`deploy`]**: the two-pass [`Deployer`](deploy::Deployer) and its seams
//! - **[`operations`]**: injectable filesystem access
//! - **[`commands`]**: top-level subcommand orchestration (`deploy`, `plan`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod deploy;
pub mod error;
pub mod logging;
pub mod operations;
