//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides trait definitions for building data pipelines
//! that extract data from sources, transform it, and load it to destinations.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::{LoadOutcome, Loader};
pub use pipeline::{Pipeline, ProcessStatus};
pub use transform::Transformer;

/// The three stages of a process, named after their configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extract => write!(f, "extraction"),
            Self::Transform => write!(f, "transformation"),
            Self::Load => write!(f, "loading"),
        }
    }
}
