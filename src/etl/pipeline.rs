//! Pipeline orchestration for one ETL process

use super::{Extractor, Loader, Stage, Transformer};
use crate::envelope::Envelope;
use crate::process_context::ProcessContext;
use owo_colors::OwoColorize;

/// Final state of one process in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// The process is inactive and was never instantiated
    Skipped,
    /// Every stage ran; `loaded` is what the loader reported as written
    Completed { extracted: usize, loaded: usize },
    /// A stage's `setup` reported an unmet precondition
    SetupFailed { stage: Stage },
    /// A stage failed; remaining stages were not run
    Failed { stage: Stage, error: String },
    /// The process exceeded its time budget
    TimedOut { secs: u64 },
    /// Every `setup` succeeded; nothing was extracted or loaded (`check` runs)
    Ready,
}

impl ProcessStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Skipped | Self::Completed { .. } | Self::Ready)
    }

    fn failed(stage: Stage, error: impl std::fmt::Display) -> Self {
        Self::Failed {
            stage,
            error: error.to_string(),
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped (inactive)"),
            Self::Completed { extracted, loaded } => {
                write!(f, "completed ({} extracted, {} loaded)", extracted, loaded)
            }
            Self::SetupFailed { stage } => write!(f, "{} setup failed", stage),
            Self::Failed { stage, error } => write!(f, "{} failed: {}", stage, error),
            Self::TimedOut { secs } => write!(f, "timed out after {}s", secs),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// ETL Pipeline that sequences Extract, Transform, and Load for one process
///
/// # Type Parameters
/// - `E`: Extractor type
/// - `T`: Transformer type (the stage is skipped when `None`)
/// - `L`: Loader type
///
/// Each stage runs `setup` and then its single operation. A failed setup or
/// an error stops the process at that stage; the returned [`ProcessStatus`]
/// says where. A failing transformer is not fatal: the untransformed
/// envelope is loaded instead.
pub struct Pipeline<E, T, L> {
    ctx: ProcessContext,
    extractor: E,
    transformer: Option<T>,
    loader: L,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer,
    L: Loader,
{
    /// Create a new pipeline
    pub fn new(ctx: ProcessContext, extractor: E, transformer: Option<T>, loader: L) -> Self {
        Self {
            ctx,
            extractor,
            transformer,
            loader,
        }
    }

    /// Run the complete ETL pipeline
    ///
    /// Steps:
    /// 1. Set up the extractor and extract an envelope
    /// 2. Set up the transformer and transform (if configured)
    /// 3. Set up the loader and load
    pub async fn run(mut self) -> ProcessStatus {
        let ctx = self.ctx.clone();
        log::info!("{} Starting ETL pipeline", ctx);

        // Extract
        match self.extractor.setup().await {
            Ok(true) => log::debug!("{} Extractor setup successful", ctx),
            Ok(false) => {
                log::error!("{} Extractor setup failed", ctx);
                return ProcessStatus::SetupFailed {
                    stage: Stage::Extract,
                };
            }
            Err(e) => {
                log::error!("{} Extractor setup error: {:?}", ctx, e);
                return ProcessStatus::failed(Stage::Extract, format!("{:#}", e));
            }
        }
        let data = match self.extractor.extract().await {
            Ok(data) => data,
            Err(e) => {
                log::error!("{} Extraction error: {:?}", ctx, e);
                return ProcessStatus::failed(Stage::Extract, format!("{:#}", e));
            }
        };
        let extracted = data.len();
        log::info!("{} Extracted {} item(s)", ctx, extracted.green());

        // Transform
        let data = match self.transformer.as_mut() {
            Some(transformer) => match transformer.setup() {
                Ok(true) => Self::transform_or_passthrough(&ctx, transformer, data),
                Ok(false) => {
                    log::error!("{} Transformer setup failed", ctx);
                    return ProcessStatus::SetupFailed {
                        stage: Stage::Transform,
                    };
                }
                Err(e) => {
                    log::error!("{} Transformer setup error: {:?}", ctx, e);
                    return ProcessStatus::failed(Stage::Transform, format!("{:#}", e));
                }
            },
            None => {
                log::debug!("{} No transformation configured", ctx);
                data
            }
        };

        // Load
        match self.loader.setup().await {
            Ok(true) => log::debug!("{} Loader setup successful", ctx),
            Ok(false) => {
                log::error!("{} Loader setup failed", ctx);
                return ProcessStatus::SetupFailed { stage: Stage::Load };
            }
            Err(e) => {
                log::error!("{} Loader setup error: {:?}", ctx, e);
                return ProcessStatus::failed(Stage::Load, format!("{:#}", e));
            }
        }
        let total = data.len();
        match self.loader.load(data).await {
            Ok(outcome) if outcome.success => {
                log::info!("{} Loaded {} item(s)", ctx, outcome.loaded.green());
                ProcessStatus::Completed {
                    extracted,
                    loaded: outcome.loaded,
                }
            }
            Ok(outcome) => {
                log::error!(
                    "{} Load incomplete: {}/{} item(s) written",
                    ctx,
                    outcome.loaded,
                    total
                );
                ProcessStatus::failed(
                    Stage::Load,
                    format!("load incomplete ({}/{} item(s) written)", outcome.loaded, total),
                )
            }
            Err(e) => {
                log::error!("{} Load error: {:?}", ctx, e);
                ProcessStatus::failed(Stage::Load, format!("{:#}", e))
            }
        }
    }

    /// Run every stage's `setup` without extracting or loading
    pub async fn check(mut self) -> ProcessStatus {
        let ctx = self.ctx.clone();

        let extractor = self.extractor.setup().await;
        if let Some(status) = Self::setup_status(&ctx, Stage::Extract, extractor) {
            return status;
        }
        if let Some(transformer) = self.transformer.as_mut() {
            let result = transformer.setup();
            if let Some(status) = Self::setup_status(&ctx, Stage::Transform, result) {
                return status;
            }
        }
        let loader = self.loader.setup().await;
        if let Some(status) = Self::setup_status(&ctx, Stage::Load, loader) {
            return status;
        }

        log::info!("{} All stages ready", ctx);
        ProcessStatus::Ready
    }

    fn setup_status(
        ctx: &ProcessContext,
        stage: Stage,
        result: eyre::Result<bool>,
    ) -> Option<ProcessStatus> {
        match result {
            Ok(true) => {
                log::debug!("{} {} setup successful", ctx, stage);
                None
            }
            Ok(false) => {
                log::error!("{} {} setup failed", ctx, stage);
                Some(ProcessStatus::SetupFailed { stage })
            }
            Err(e) => {
                log::error!("{} {} setup error: {:?}", ctx, stage, e);
                Some(ProcessStatus::failed(stage, format!("{:#}", e)))
            }
        }
    }

    fn transform_or_passthrough(ctx: &ProcessContext, transformer: &T, data: Envelope) -> Envelope {
        match transformer.transform(&data) {
            Ok(transformed) => {
                log::info!("{} Transformed {} item(s)", ctx, transformed.len().green());
                transformed
            }
            Err(e) => {
                log::error!(
                    "{} Transformation failed, passing data through unchanged: {:#}",
                    ctx,
                    e
                );
                data
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Record;
    use crate::etl::LoadOutcome;
    use eyre::Result;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn envelope(values: Vec<serde_json::Value>) -> Envelope {
        Envelope::from_values(values).unwrap()
    }

    struct MockExtractor {
        ready: bool,
        data: Envelope,
    }

    impl Extractor for MockExtractor {
        async fn setup(&mut self) -> Result<bool> {
            Ok(self.ready)
        }
        async fn extract(&mut self) -> Result<Envelope> {
            Ok(self.data.clone())
        }
    }

    struct StampTransformer {
        fail: bool,
    }

    impl Transformer for StampTransformer {
        fn setup(&mut self) -> Result<bool> {
            Ok(true)
        }
        fn transform(&self, input: &Envelope) -> Result<Envelope> {
            if self.fail {
                eyre::bail!("hook exploded");
            }
            Ok(input.map_records(|record| {
                let mut record: Record = record.clone();
                record.insert("stamped".to_string(), json!(true));
                record
            }))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLoader {
        received: Arc<Mutex<Option<Envelope>>>,
        ready: bool,
    }

    impl Loader for RecordingLoader {
        async fn setup(&mut self) -> Result<bool> {
            Ok(self.ready)
        }
        async fn load(&mut self, envelope: Envelope) -> Result<LoadOutcome> {
            let count = envelope.len();
            *self.received.lock().unwrap() = Some(envelope);
            Ok(LoadOutcome::complete(count))
        }
    }

    fn loader() -> RecordingLoader {
        RecordingLoader {
            ready: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pipeline() {
        let loader = loader();
        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: true,
                data: envelope(vec![json!({"id": 1}), json!({"id": 2})]),
            },
            Some(StampTransformer { fail: false }),
            loader.clone(),
        );

        let status = pipeline.run().await;
        assert_eq!(
            status,
            ProcessStatus::Completed {
                extracted: 2,
                loaded: 2
            }
        );
        let received = loader.received.lock().unwrap().clone().unwrap();
        assert_eq!(received.items[1]["stamped"], json!(true));
    }

    #[tokio::test]
    async fn test_failed_transform_passes_original_through() {
        let input = envelope(vec![json!({"id": "1", "no": "A"})]);
        let loader = loader();
        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: true,
                data: input.clone(),
            },
            Some(StampTransformer { fail: true }),
            loader.clone(),
        );

        let status = pipeline.run().await;
        assert!(!status.is_failure());
        let received = loader.received.lock().unwrap().clone().unwrap();
        assert_eq!(
            serde_json::to_vec(&received).unwrap(),
            serde_json::to_vec(&input).unwrap()
        );
    }

    #[tokio::test]
    async fn test_extractor_setup_failure_stops_process() {
        let loader = loader();
        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: false,
                data: Envelope::empty(),
            },
            None::<StampTransformer>,
            loader.clone(),
        );

        let status = pipeline.run().await;
        assert_eq!(
            status,
            ProcessStatus::SetupFailed {
                stage: Stage::Extract
            }
        );
        assert!(loader.received.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_loader_setup_failure() {
        let loader = RecordingLoader::default();
        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: true,
                data: envelope(vec![json!({"id": 1})]),
            },
            None::<StampTransformer>,
            loader.clone(),
        );

        let status = pipeline.run().await;
        assert_eq!(status, ProcessStatus::SetupFailed { stage: Stage::Load });
        assert!(status.is_failure());
    }

    #[tokio::test]
    async fn test_check_runs_setups_only() {
        let loader = loader();
        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: true,
                data: envelope(vec![json!({"id": 1})]),
            },
            Some(StampTransformer { fail: true }),
            loader.clone(),
        );

        assert_eq!(pipeline.check().await, ProcessStatus::Ready);
        assert!(loader.received.lock().unwrap().is_none());

        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: true,
                data: Envelope::empty(),
            },
            None::<StampTransformer>,
            RecordingLoader::default(),
        );
        assert_eq!(
            pipeline.check().await,
            ProcessStatus::SetupFailed { stage: Stage::Load }
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let loader = loader();
        let pipeline = Pipeline::new(
            ProcessContext::new("test"),
            MockExtractor {
                ready: true,
                data: Envelope::empty(),
            },
            None::<StampTransformer>,
            loader.clone(),
        );

        let status = pipeline.run().await;
        assert_eq!(
            status,
            ProcessStatus::Completed {
                extracted: 0,
                loaded: 0
            }
        );
    }
}
