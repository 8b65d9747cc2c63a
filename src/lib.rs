//! # stem-splitter-server
//!
//! Drives the Demucs command-line tool to split an uploaded track into
//! vocals, drums, bass and other, and serves the result over HTTP.

pub mod config;
pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod types;

pub use crate::{
    config::{Settings, ToolConfig},
    core::{
        archive::zip_dir,
        cleanup::{defer_removal, remove_tree, CleanupGuard},
        locator::locate_stems_dir,
        normalize::slugify_basename,
        separator::{probe_tool, DemucsCli, ToolProbe},
        stems::find_stems,
    },
    error::{Result, StemError},
    io::progress::Progress,
    model::ModelRegistry,
    pipeline::{Pipeline, SeparationFailure, WorkArea},
    types::{Device, SeparationOutput, StemKey, StemSet},
};
