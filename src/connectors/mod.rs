//! Connectors and the factory that builds them from stage specs
//!
//! Every stage spec names its connector with a `type` discriminator. The
//! discriminator selects a variant of [`AnyExtractor`], [`AnyTransformer`] or
//! [`AnyLoader`]; an unknown one is an [`EtlError::UnsupportedVariant`].
//!
//! | stage          | types                                  |
//! |----------------|----------------------------------------|
//! | extraction     | `gevisapi`, `csvfile`, `mssql`         |
//! | transformation | `hookfunction`                         |
//! | loading        | `d3businessobjects`, `mssql`, `csv`    |

pub mod business_objects;
pub mod delimited;
pub mod gevis;
pub mod mssql;

use crate::config::{Settings, StageSpec};
use crate::envelope::Envelope;
use crate::error::EtlError;
use crate::etl::{Extractor, LoadOutcome, Loader, Stage, Transformer};
use crate::process_context::ProcessContext;
use crate::transform::{HookRegistry, HookTransformer};
use business_objects::BusinessObjectsLoader;
use delimited::{CsvFileExtractor, CsvLoader};
use eyre::Result;
use gevis::GevisExtractor;
use mssql::{MssqlExtractor, MssqlLoader};
use std::str::FromStr;
use std::sync::Arc;

/// Extraction connector types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    GevisApi,
    CsvFile,
    Mssql,
}

impl ExtractorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GevisApi => "gevisapi",
            Self::CsvFile => "csvfile",
            Self::Mssql => "mssql",
        }
    }
}

impl FromStr for ExtractorKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gevisapi" => Ok(Self::GevisApi),
            "csvfile" => Ok(Self::CsvFile),
            "mssql" => Ok(Self::Mssql),
            _ => Err(EtlError::UnsupportedVariant {
                stage: Stage::Extract,
                kind: s.to_string(),
            }),
        }
    }
}

/// Transformation connector types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformerKind {
    HookFunction,
}

impl TransformerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HookFunction => "hookfunction",
        }
    }
}

impl FromStr for TransformerKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hookfunction" => Ok(Self::HookFunction),
            _ => Err(EtlError::UnsupportedVariant {
                stage: Stage::Transform,
                kind: s.to_string(),
            }),
        }
    }
}

/// Loading connector types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    BusinessObjects,
    Mssql,
    Csv,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessObjects => "d3businessobjects",
            Self::Mssql => "mssql",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for LoaderKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d3businessobjects" => Ok(Self::BusinessObjects),
            "mssql" => Ok(Self::Mssql),
            "csv" => Ok(Self::Csv),
            _ => Err(EtlError::UnsupportedVariant {
                stage: Stage::Load,
                kind: s.to_string(),
            }),
        }
    }
}

/// Any supported extractor
pub enum AnyExtractor {
    GevisApi(GevisExtractor),
    CsvFile(CsvFileExtractor),
    Mssql(MssqlExtractor),
}

impl Extractor for AnyExtractor {
    async fn setup(&mut self) -> Result<bool> {
        match self {
            Self::GevisApi(e) => e.setup().await,
            Self::CsvFile(e) => e.setup().await,
            Self::Mssql(e) => e.setup().await,
        }
    }

    async fn extract(&mut self) -> Result<Envelope> {
        match self {
            Self::GevisApi(e) => e.extract().await,
            Self::CsvFile(e) => e.extract().await,
            Self::Mssql(e) => e.extract().await,
        }
    }
}

/// Any supported transformer
pub enum AnyTransformer {
    HookFunction(HookTransformer),
}

impl Transformer for AnyTransformer {
    fn setup(&mut self) -> Result<bool> {
        match self {
            Self::HookFunction(t) => t.setup(),
        }
    }

    fn transform(&self, input: &Envelope) -> Result<Envelope> {
        match self {
            Self::HookFunction(t) => t.transform(input),
        }
    }
}

/// Any supported loader
pub enum AnyLoader {
    BusinessObjects(Box<BusinessObjectsLoader>),
    Mssql(MssqlLoader),
    Csv(CsvLoader),
}

impl Loader for AnyLoader {
    async fn setup(&mut self) -> Result<bool> {
        match self {
            Self::BusinessObjects(l) => l.setup().await,
            Self::Mssql(l) => l.setup().await,
            Self::Csv(l) => l.setup().await,
        }
    }

    async fn load(&mut self, envelope: Envelope) -> Result<LoadOutcome> {
        match self {
            Self::BusinessObjects(l) => l.load(envelope).await,
            Self::Mssql(l) => l.load(envelope).await,
            Self::Csv(l) => l.load(envelope).await,
        }
    }
}

/// Builds the connectors of one process from its stage specs
///
/// The orchestrator only talks to this trait, so a run can be driven by
/// something other than [`Connectors`] (tests count instantiations this way).
pub trait ConnectorFactory: Send + Sync {
    type Extractor: Extractor + 'static;
    type Transformer: Transformer + 'static;
    type Loader: Loader + 'static;

    fn extractor(&self, spec: &StageSpec, ctx: &ProcessContext) -> Result<Self::Extractor>;
    fn transformer(&self, spec: &StageSpec, ctx: &ProcessContext) -> Result<Self::Transformer>;
    fn loader(&self, spec: &StageSpec, ctx: &ProcessContext) -> Result<Self::Loader>;
}

/// The built-in connectors
#[derive(Debug, Clone)]
pub struct Connectors {
    settings: Settings,
    hooks: Arc<HookRegistry>,
}

impl Connectors {
    pub fn new(settings: Settings, hooks: HookRegistry) -> Self {
        Self {
            settings,
            hooks: Arc::new(hooks),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

impl Default for Connectors {
    fn default() -> Self {
        Self::new(Settings::default(), HookRegistry::with_builtins())
    }
}

impl ConnectorFactory for Connectors {
    type Extractor = AnyExtractor;
    type Transformer = AnyTransformer;
    type Loader = AnyLoader;

    fn extractor(&self, spec: &StageSpec, ctx: &ProcessContext) -> Result<AnyExtractor> {
        let stage = Stage::Extract;
        let kind: ExtractorKind = spec.require_kind(stage)?.parse()?;
        let ctx = ctx.component(kind.as_str());
        let settings = &self.settings;

        Ok(match kind {
            ExtractorKind::GevisApi => {
                AnyExtractor::GevisApi(GevisExtractor::try_new(ctx, spec.parse(stage)?, settings)?)
            }
            ExtractorKind::CsvFile => {
                AnyExtractor::CsvFile(CsvFileExtractor::try_new(ctx, spec.parse(stage)?, settings)?)
            }
            ExtractorKind::Mssql => {
                AnyExtractor::Mssql(MssqlExtractor::new(ctx, spec.parse(stage)?, settings))
            }
        })
    }

    fn transformer(&self, spec: &StageSpec, ctx: &ProcessContext) -> Result<AnyTransformer> {
        let stage = Stage::Transform;
        let kind: TransformerKind = spec.require_kind(stage)?.parse()?;
        let ctx = ctx.component(kind.as_str());

        Ok(match kind {
            TransformerKind::HookFunction => AnyTransformer::HookFunction(HookTransformer::new(
                ctx,
                spec.parse(stage)?,
                self.hooks.clone(),
                &self.settings.debug_dir,
            )),
        })
    }

    fn loader(&self, spec: &StageSpec, ctx: &ProcessContext) -> Result<AnyLoader> {
        let stage = Stage::Load;
        let kind: LoaderKind = spec.require_kind(stage)?.parse()?;
        let ctx = ctx.component(kind.as_str());
        let settings = &self.settings;

        Ok(match kind {
            LoaderKind::BusinessObjects => AnyLoader::BusinessObjects(Box::new(
                BusinessObjectsLoader::try_new(ctx, spec.parse(stage)?, settings)?,
            )),
            LoaderKind::Mssql => AnyLoader::Mssql(MssqlLoader::new(ctx, spec.parse(stage)?, settings)),
            LoaderKind::Csv => AnyLoader::Csv(CsvLoader::try_new(ctx, spec.parse(stage)?, settings)?),
        })
    }
}
