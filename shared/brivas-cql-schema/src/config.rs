//! Reader Configuration

use serde::{Deserialize, Serialize};

use crate::dialect::SchemaDialect;
use crate::{Result, SchemaError};

/// How the system-table dialect is chosen for a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectSelection {
    /// Pick from the server's release version
    #[default]
    Auto,
    /// Always query `system.schema_*`
    Legacy,
    /// Always query `system_schema.*`
    Modern,
}

impl DialectSelection {
    /// The forced dialect, if any
    pub fn forced(self) -> Option<SchemaDialect> {
        match self {
            Self::Auto => None,
            Self::Legacy => Some(SchemaDialect::Legacy),
            Self::Modern => Some(SchemaDialect::Modern),
        }
    }
}

impl std::str::FromStr for DialectSelection {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "legacy" => Ok(Self::Legacy),
            "modern" => Ok(Self::Modern),
            other => Err(SchemaError::Configuration(format!(
                "Invalid CQL_SCHEMA_DIALECT: {}",
                other
            ))),
        }
    }
}

/// Schema reader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub dialect: DialectSelection,
    /// Also read storage properties and the compact-storage flag
    pub read_properties: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            dialect: DialectSelection::Auto,
            read_properties: true,
        }
    }
}

impl ReaderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dialect = match lookup("CQL_SCHEMA_DIALECT") {
            Some(value) => value.parse()?,
            None => DialectSelection::Auto,
        };

        let read_properties = match lookup("CQL_SCHEMA_READ_PROPERTIES") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                SchemaError::Configuration(format!(
                    "Invalid CQL_SCHEMA_READ_PROPERTIES: {}",
                    value
                ))
            })?,
            None => true,
        };

        Ok(Self {
            dialect,
            read_properties,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
