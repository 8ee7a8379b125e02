//! Metadata Session and Keyspace Handle

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::dialect::SchemaDialect;
use crate::reader::SchemaReader;
use crate::table::Table;
use crate::{ReaderConfig, Result, SchemaError};

/// Error returned by a session when a statement cannot be executed
pub type QueryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One result row, keyed by column name
///
/// JSON `null` is treated the same as an absent column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column).filter(|value| !value.is_null())
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn get_i32(&self, column: &str) -> Option<i32> {
        self.get(column)
            .and_then(Value::as_i64)
            .and_then(|n| i32::try_from(n).ok())
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }

    /// A `list<text>`/`set<text>` value
    pub fn get_text_list(&self, column: &str) -> Option<Vec<String>> {
        self.get(column)?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// A `map<text, text>` value
    pub fn get_text_map(&self, column: &str) -> Option<BTreeMap<String, String>> {
        self.get(column)?
            .as_object()?
            .iter()
            .map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.as_str(), v))
    }
}

impl From<serde_json::Map<String, Value>> for Row {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Read-only access to the database's system tables
///
/// Implemented by the connection layer. Statements are always bound with
/// positional `?` markers; the values slice is bound in order.
#[async_trait]
pub trait MetadataSession: Send + Sync {
    /// Execute a bound statement and return every row
    async fn execute(&self, cql: &str, values: &[&str]) -> std::result::Result<Vec<Row>, QueryError>;

    /// `release_version` of the connected node, e.g. `"3.11.4"`
    async fn release_version(&self) -> std::result::Result<String, QueryError>;
}

/// A keyspace on a specific session
pub struct Keyspace<S: ?Sized> {
    session: Arc<S>,
    name: String,
    config: ReaderConfig,
}

impl<S: ?Sized> Clone for Keyspace<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            name: self.name.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: MetadataSession + ?Sized> Keyspace<S> {
    pub fn new(session: Arc<S>, name: impl Into<String>) -> Self {
        Self {
            session,
            name: name.into(),
            config: ReaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Read one table's schema
    pub async fn read_table(&self, table_name: &str) -> Result<Option<Table>> {
        SchemaReader::new(self, table_name).read().await
    }

    /// Names of every table in the keyspace, sorted
    #[instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn table_names(&self) -> Result<Vec<String>> {
        let dialect = self.dialect().await?;
        let rows = self
            .execute(dialect.table_names_query(), &[self.name.as_str()])
            .await?;

        let mut names = rows
            .iter()
            .map(|row| {
                dialect
                    .table_name_of(row)
                    .map(str::to_string)
                    .ok_or_else(|| SchemaError::missing_field("table", dialect.table_name_field()))
            })
            .collect::<Result<Vec<_>>>()?;
        names.sort();

        debug!(count = names.len(), "Listed tables");
        Ok(names)
    }

    /// Whether the keyspace itself exists
    #[instrument(skip(self), fields(keyspace = %self.name))]
    pub async fn exists(&self) -> Result<bool> {
        let dialect = self.dialect().await?;
        let rows = self
            .execute(dialect.keyspace_query(), &[self.name.as_str()])
            .await?;
        Ok(!rows.is_empty())
    }

    pub(crate) async fn dialect(&self) -> Result<SchemaDialect> {
        self.resolve_dialect(&self.config).await
    }

    pub(crate) async fn resolve_dialect(&self, config: &ReaderConfig) -> Result<SchemaDialect> {
        if let Some(dialect) = config.dialect.forced() {
            return Ok(dialect);
        }

        let version = self
            .session
            .release_version()
            .await
            .map_err(SchemaError::MetadataQuery)?;
        SchemaDialect::for_release_version(&version)
    }

    pub(crate) async fn execute(&self, cql: &str, values: &[&str]) -> Result<Vec<Row>> {
        self.session
            .execute(cql, values)
            .await
            .map_err(SchemaError::MetadataQuery)
    }
}
