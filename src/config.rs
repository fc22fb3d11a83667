//! Configuration loader and schema types.
//!
//! This module exposes the configuration schema that drives scanning,
//! playback and logging, plus helpers to load it from disk.

mod load;
mod schema;

pub use load::resolve_config_path;
pub use schema::*;
