//! Typed errors raised while turning configuration into connectors
//!
//! Everything else in the crate propagates `eyre::Report`; these variants exist
//! so callers can tell a misconfigured process apart from a runtime failure.

use crate::etl::Stage;

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// The `type` discriminator names a connector this build does not know
    #[error("unsupported {stage} type '{kind}'")]
    UnsupportedVariant { stage: Stage, kind: String },

    /// The stage configuration has no `type` field at all
    #[error("{stage} configuration has no 'type'")]
    MissingType { stage: Stage },

    /// The stage configuration could not be decoded into the connector's settings
    #[error("invalid {kind} {stage} configuration: {source}")]
    InvalidConfig {
        stage: Stage,
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// A hook transformer references a function that was never registered
    #[error("hook function '{0}' is not registered")]
    UnknownHook(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_variant_message() {
        let err = EtlError::UnsupportedVariant {
            stage: Stage::Load,
            kind: "oracle".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported loading type 'oracle'");
    }

    #[test]
    fn test_downcast_from_report() {
        let report: eyre::Report = EtlError::MissingType {
            stage: Stage::Extract,
        }
        .into();
        assert!(matches!(
            report.downcast_ref::<EtlError>(),
            Some(EtlError::MissingType {
                stage: Stage::Extract
            })
        ));
    }
}
