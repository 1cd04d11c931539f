//! SQL Server tables
//!
//! Connections are opened per connector during `setup` and never pooled.

mod extractor;
mod loader;
mod session;
mod statement;

pub use extractor::{MssqlExtractConfig, MssqlExtractor};
pub use loader::{MssqlLoadConfig, MssqlLoader};
pub use session::{ConnectionConfig, SqlClient, connect, row_to_record, table_exists};
pub use statement::{BoundStatement, InsertTemplate, SqlValue};
