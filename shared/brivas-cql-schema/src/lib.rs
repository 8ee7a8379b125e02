//! Brivas CQL Schema Reader
//!
//! Reads the live schema of a Cassandra/ScyllaDB table from the system
//! tables and decodes it into a [`Table`] that schema sync can diff against
//! the declared model. Handles both the pre-3.0 `system.schema_*` layout and
//! the `system_schema` keyspace, and both type spellings they use.

mod config;
mod decoder;
mod dialect;
mod error;
mod query;
mod reader;
mod session;
mod table;
mod types;

pub use config::{DialectSelection, ReaderConfig};
pub use decoder::decode;
pub use dialect::{CollectionEncoding, ColumnKind, ColumnRow, IndexRow, SchemaDialect};
pub use error::{Result, SchemaError};
pub use query::{MetadataQuery, TableColumns};
pub use reader::SchemaReader;
pub use session::{Keyspace, MetadataSession, QueryError, Row};
pub use table::{
    ClusteringColumn, ClusteringOrder, CollectionColumn, CollectionType, ColumnRef, DataColumn,
    PartitionKey, Table,
};
pub use types::{CollectionKind, PrimitiveKind, TypeDescriptor};

/// Re-export for convenience
pub mod prelude {
    pub use super::{Keyspace, MetadataSession, ReaderConfig, Result, SchemaError, SchemaReader, Table};
    pub use super::types::*;
}
