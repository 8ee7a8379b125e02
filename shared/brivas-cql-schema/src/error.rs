//! Schema Reader Error Types

use thiserror::Error;

use crate::session::QueryError;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unrecognized type encoding: {encoding}")]
    UnrecognizedType { encoding: String },

    #[error("Metadata query error: {0}")]
    MetadataQuery(#[source] QueryError),

    #[error("Malformed schema metadata: {0}")]
    MalformedMetadata(String),

    #[error("Unsupported release version: {0}")]
    UnsupportedReleaseVersion(String),

    #[error("Column {column} is already defined on table {table}")]
    DuplicateColumn { table: String, column: String },

    #[error("Invalid table definition: {0}")]
    InvalidTable(String),

    #[error("Clustering column {column} is stored reversed but declared ascending")]
    InconsistentClusteringOrder { column: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SchemaError {
    pub(crate) fn unrecognized(encoding: &str) -> Self {
        Self::UnrecognizedType {
            encoding: encoding.to_string(),
        }
    }

    pub(crate) fn missing_field(source: &str, field: &str) -> Self {
        Self::MalformedMetadata(format!("{} row has no {} value", source, field))
    }
}
