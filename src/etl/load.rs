//! Loader trait for writing records to destinations

use crate::envelope::Envelope;
use eyre::Result;

/// Result of a single `load` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Whether every write the loader attempted succeeded
    pub success: bool,
    /// Number of records written
    pub loaded: usize,
}

impl LoadOutcome {
    pub fn complete(loaded: usize) -> Self {
        Self {
            success: true,
            loaded,
        }
    }

    pub fn failed(loaded: usize) -> Self {
        Self {
            success: false,
            loaded,
        }
    }
}

/// Loader trait for loading records to a destination
///
/// Implementors define how to write records to destinations:
/// - Batch object APIs
/// - SQL Server tables
/// - Delimited files
///
/// # Example
/// ```no_run
/// use etlit::etl::{LoadOutcome, Loader};
/// use etlit::Envelope;
/// use eyre::Result;
/// use std::path::PathBuf;
///
/// struct JsonFileLoader {
///     path: PathBuf,
/// }
///
/// impl Loader for JsonFileLoader {
///     async fn setup(&mut self) -> Result<bool> {
///         Ok(true)
///     }
///
///     async fn load(&mut self, envelope: Envelope) -> Result<LoadOutcome> {
///         std::fs::write(&self.path, serde_json::to_vec(&envelope)?)?;
///         Ok(LoadOutcome::complete(envelope.len()))
///     }
/// }
/// ```
pub trait Loader: Send {
    /// Validate the destination and prepare it for writing
    ///
    /// Returns `Ok(false)` when the destination is not usable.
    fn setup(&mut self) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Load the envelope's records to the destination
    ///
    /// An empty envelope is a successful no-op.
    ///
    /// # Errors
    /// Returns an error if loading fails in a way the loader cannot report
    /// through [`LoadOutcome`]
    fn load(
        &mut self,
        envelope: Envelope,
    ) -> impl std::future::Future<Output = Result<LoadOutcome>> + Send;
}
