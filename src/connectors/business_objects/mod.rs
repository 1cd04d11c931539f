//! Custom business objects API
//!
//! Provides the `d3businessobjects` loader with schema verification, entity
//! creation, truncation and batched upserts.

mod batch;
mod loader;
mod schema;

pub use batch::{BatchHeaders, BatchRequest, FailedItem, batch_payload, build_batch_requests, failed_items};
pub use loader::{BusinessObjectsLoader, LoaderState};
pub use schema::{BusinessObjectsConfig, EntityConfig, EntityKey, EntityKeyType, RemoteSchema};
