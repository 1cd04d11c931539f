//! etlit
//!
//! A configuration-driven ETL runner: each configured process extracts records
//! from a REST API, SQL Server table or CSV file, optionally transforms them
//! with a registered hook, and loads them into a batch object API, SQL Server
//! table or CSV file.

pub mod cli;
pub mod client;
pub mod config;
pub mod connectors;
pub mod envelope;
pub mod error;
pub mod etl;
pub mod orchestrator;
pub mod process_context;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use client::{ApiClient, Auth, ClientCredentials};
pub use config::{EtlConfig, ProcessDefinition, Settings, StageSpec};
pub use connectors::{ConnectorFactory, Connectors};
pub use envelope::{Envelope, FieldMapping, Record};
pub use error::EtlError;
pub use etl::{Extractor, LoadOutcome, Loader, Pipeline, ProcessStatus, Stage, Transformer};
pub use orchestrator::{Orchestrator, ProcessReport, RunSummary};
pub use process_context::ProcessContext;
pub use transform::HookRegistry;
