//! Extractor trait for pulling records from a source

use crate::envelope::Envelope;
use eyre::Result;

/// Extractor trait for extracting records from a source
///
/// Implementors define how to pull records from sources like:
/// - REST APIs
/// - SQL Server tables
/// - Delimited files
///
/// An extractor is used exactly once: `setup` followed by a single `extract`.
///
/// # Example
/// ```no_run
/// use etlit::etl::Extractor;
/// use etlit::Envelope;
/// use eyre::Result;
/// use std::path::PathBuf;
///
/// struct JsonFileExtractor {
///     path: PathBuf,
/// }
///
/// impl Extractor for JsonFileExtractor {
///     async fn setup(&mut self) -> Result<bool> {
///         Ok(self.path.exists())
///     }
///
///     async fn extract(&mut self) -> Result<Envelope> {
///         let text = std::fs::read_to_string(&self.path)?;
///         Ok(serde_json::from_str(&text)?)
///     }
/// }
/// ```
pub trait Extractor: Send {
    /// Validate preconditions and acquire whatever the extraction needs
    ///
    /// Returns `Ok(false)` when a precondition is not met (missing file,
    /// unreachable database, rejected credentials). The process is skipped.
    ///
    /// # Errors
    /// Returns an error for failures that are not a plain precondition miss
    fn setup(&mut self) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Pull records from the source
    ///
    /// Ordinary remote failures are logged and produce an empty envelope.
    ///
    /// # Errors
    /// Returns an error only for failures the extractor cannot degrade from
    fn extract(&mut self) -> impl std::future::Future<Output = Result<Envelope>> + Send;
}
