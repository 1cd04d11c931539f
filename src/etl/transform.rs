//! Transformer trait for envelope transformation

use crate::envelope::Envelope;
use eyre::Result;

/// Transformer trait for transforming an envelope
///
/// Implementors define business logic between extraction and loading:
/// - Data cleaning (removing fields or characters)
/// - Data enrichment (adding fields)
/// - Reshaping records
///
/// The input is borrowed so a failed transformation can never damage it: the
/// pipeline hands the original envelope to the loader whenever `transform`
/// returns an error.
///
/// # Example
/// ```
/// use etlit::etl::Transformer;
/// use etlit::Envelope;
/// use eyre::Result;
/// use serde_json::json;
///
/// struct CompanyStamp(String);
///
/// impl Transformer for CompanyStamp {
///     fn setup(&mut self) -> Result<bool> {
///         Ok(!self.0.is_empty())
///     }
///
///     fn transform(&self, input: &Envelope) -> Result<Envelope> {
///         Ok(input.map_records(|record| {
///             let mut record = record.clone();
///             record.insert("company".to_string(), json!(self.0));
///             record
///         }))
///     }
/// }
/// ```
pub trait Transformer: Send {
    /// Verify the transformation can run
    fn setup(&mut self) -> Result<bool>;

    /// Transform the envelope into a new one
    ///
    /// # Errors
    /// Returns an error if transformation fails; callers fall back to the input
    fn transform(&self, input: &Envelope) -> Result<Envelope>;
}
