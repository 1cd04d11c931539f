//! Runs configured processes and collects their reports

use crate::config::{ProcessDefinition, Settings};
use crate::connectors::ConnectorFactory;
use crate::etl::{Pipeline, ProcessStatus, Stage};
use crate::process_context::ProcessContext;
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub name: String,
    pub status: ProcessStatus,
    pub duration: Duration,
}

/// Reports of a whole run, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<ProcessReport>,
}

impl RunSummary {
    pub fn failures(&self) -> impl Iterator<Item = &ProcessReport> {
        self.reports.iter().filter(|r| r.status.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.status == ProcessStatus::Skipped)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Log one line per process followed by the totals
    pub fn log(&self) {
        for report in &self.reports {
            if report.status.is_failure() {
                log::error!(
                    "{} {} ({:.1?})",
                    report.name.red(),
                    report.status,
                    report.duration
                );
            } else {
                log::info!(
                    "{} {} ({:.1?})",
                    report.name.green(),
                    report.status,
                    report.duration
                );
            }
        }
        log::info!(
            "{} process(es): {} failed, {} skipped",
            self.reports.len(),
            self.failure_count(),
            self.skipped_count()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Check,
}

/// Drives processes through the ETL pipeline
///
/// Processes are isolated: whatever happens to one (unsupported connector,
/// failed setup, error, timeout, panic) ends up in its report and the next
/// one still runs.
///
/// # Example
/// ```no_run
/// use etlit::config::EtlConfig;
/// use etlit::connectors::Connectors;
/// use etlit::orchestrator::Orchestrator;
/// use etlit::transform::HookRegistry;
///
/// # async fn example() -> eyre::Result<()> {
/// let config = EtlConfig::read("etl.yml")?;
/// let connectors = Connectors::new(config.settings.clone(), HookRegistry::with_builtins());
/// let summary = Orchestrator::new(connectors, &config.settings)
///     .run(&config.processes)
///     .await;
/// summary.log();
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<F> {
    factory: Arc<F>,
    process_timeout_secs: Option<u64>,
    max_parallel: usize,
}

impl<F: ConnectorFactory + 'static> Orchestrator<F> {
    pub fn new(factory: F, settings: &Settings) -> Self {
        Self {
            factory: Arc::new(factory),
            process_timeout_secs: settings.process_timeout_secs,
            max_parallel: settings.max_parallel.max(1),
        }
    }

    /// Override the number of processes run at once
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Extract, transform and load every active process
    pub async fn run(&self, processes: &[ProcessDefinition]) -> RunSummary {
        self.execute(processes, Mode::Run).await
    }

    /// Build every active process and run its setups only
    pub async fn check(&self, processes: &[ProcessDefinition]) -> RunSummary {
        self.execute(processes, Mode::Check).await
    }

    async fn execute(&self, processes: &[ProcessDefinition], mode: Mode) -> RunSummary {
        log::info!(
            "Running {} process(es), up to {} at a time",
            processes.len(),
            self.max_parallel
        );

        let reports = if self.max_parallel == 1 {
            let mut reports = Vec::with_capacity(processes.len());
            for process in processes {
                reports.push(
                    run_process(self.factory.clone(), process.clone(), self.timeout(process), mode)
                        .await,
                );
            }
            reports
        } else {
            self.execute_parallel(processes, mode).await
        };

        RunSummary { reports }
    }

    async fn execute_parallel(
        &self,
        processes: &[ProcessDefinition],
        mode: Mode,
    ) -> Vec<ProcessReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut set = JoinSet::new();

        for (index, process) in processes.iter().enumerate() {
            let factory = self.factory.clone();
            let semaphore = semaphore.clone();
            let process = process.clone();
            let timeout = self.timeout(&process);

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, run_process(factory, process, timeout, mode).await)
            });
        }

        let mut slots: Vec<Option<ProcessReport>> = vec![None; processes.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => log::error!("Process task ended abnormally: {}", e),
            }
        }

        // A slot is only empty when its task panicked
        slots
            .into_iter()
            .zip(processes)
            .map(|(slot, process)| {
                slot.unwrap_or_else(|| ProcessReport {
                    name: process.name.clone(),
                    status: ProcessStatus::Failed {
                        stage: Stage::Extract,
                        error: "process task panicked".to_string(),
                    },
                    duration: Duration::ZERO,
                })
            })
            .collect()
    }

    fn timeout(&self, process: &ProcessDefinition) -> Option<u64> {
        process.timeout_secs.or(self.process_timeout_secs)
    }
}

async fn run_process<F: ConnectorFactory>(
    factory: Arc<F>,
    process: ProcessDefinition,
    timeout_secs: Option<u64>,
    mode: Mode,
) -> ProcessReport {
    let started = Instant::now();
    let ctx = ProcessContext::new(&process.name);

    let status = if !process.active {
        log::info!("{} Process inactive, skipping", ctx);
        ProcessStatus::Skipped
    } else {
        if let Some(description) = &process.description {
            log::debug!("{} {}", ctx, description);
        }
        match build_pipeline(factory.as_ref(), &process, &ctx) {
            Ok(pipeline) => {
                let work = async move {
                    match mode {
                        Mode::Run => pipeline.run().await,
                        Mode::Check => pipeline.check().await,
                    }
                };
                match timeout_secs {
                    Some(secs) => tokio::time::timeout(Duration::from_secs(secs), work)
                        .await
                        .unwrap_or_else(|_| {
                            log::error!("{} Timed out after {}s", ctx, secs);
                            ProcessStatus::TimedOut { secs }
                        }),
                    None => work.await,
                }
            }
            Err(status) => status,
        }
    };

    ProcessReport {
        name: process.name,
        status,
        duration: started.elapsed(),
    }
}

type FactoryPipeline<F> = Pipeline<
    <F as ConnectorFactory>::Extractor,
    <F as ConnectorFactory>::Transformer,
    <F as ConnectorFactory>::Loader,
>;

/// Instantiate every connector of a process; a failure names its stage
fn build_pipeline<F: ConnectorFactory>(
    factory: &F,
    process: &ProcessDefinition,
    ctx: &ProcessContext,
) -> Result<FactoryPipeline<F>, ProcessStatus> {
    let failed = |stage: Stage, e: eyre::Report| {
        log::error!("{} Cannot build {} connector: {:#}", ctx, stage, e);
        ProcessStatus::Failed {
            stage,
            error: format!("{:#}", e),
        }
    };

    let extractor = factory
        .extractor(&process.extraction, ctx)
        .map_err(|e| failed(Stage::Extract, e))?;
    let transformer = process
        .transformation()
        .map(|spec| factory.transformer(spec, ctx))
        .transpose()
        .map_err(|e| failed(Stage::Transform, e))?;
    let loader = factory
        .loader(&process.loading, ctx)
        .map_err(|e| failed(Stage::Load, e))?;

    Ok(Pipeline::new(ctx.clone(), extractor, transformer, loader))
}
