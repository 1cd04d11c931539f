//! File system storage operations
//!
//! This module handles file I/O shared by connectors:
//! - Debug snapshots of stage data
//! - Source file discovery and relocation

mod files;
mod snapshot;

pub use files::{relocate_file, resolve_glob_path};
pub use snapshot::DebugSnapshots;
