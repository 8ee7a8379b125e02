//! Schema Reader

use tracing::{debug, info, instrument};

use crate::decoder::decode;
use crate::dialect::{ColumnRow, IndexRow, SchemaDialect};
use crate::query::{MetadataQuery, TableColumns};
use crate::session::{Keyspace, MetadataSession, Row};
use crate::table::{ClusteringOrder, CollectionColumn, CollectionType, DataColumn, Table};
use crate::types::{CollectionKind, TypeDescriptor};
use crate::{ReaderConfig, Result, SchemaError};

/// Reads the live schema of one table
///
/// A reader is built per `(keyspace, table)` request and consumed by
/// [`SchemaReader::read`]. It holds no state beyond the request.
pub struct SchemaReader<'k, S: ?Sized> {
    keyspace: &'k Keyspace<S>,
    table_name: String,
    config: ReaderConfig,
}

impl<'k, S: MetadataSession + ?Sized> SchemaReader<'k, S> {
    pub fn new(keyspace: &'k Keyspace<S>, table_name: impl Into<String>) -> Self {
        Self {
            keyspace,
            table_name: table_name.into(),
            config: keyspace.config().clone(),
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the table, or `None` if it does not exist
    ///
    /// Any query failure or unrecognized type aborts the whole read.
    #[instrument(skip(self), fields(keyspace = %self.keyspace.name(), table = %self.table_name))]
    pub async fn read(self) -> Result<Option<Table>> {
        let dialect = self.keyspace.resolve_dialect(&self.config).await?;
        let query = MetadataQuery::new(self.keyspace, dialect);
        debug!(?dialect, "Reading table schema");

        let table_row = match query.table_row(&self.table_name).await? {
            Some(row) => row,
            None => {
                debug!("Table does not exist");
                return Ok(None);
            }
        };
        let columns = query.columns(&self.table_name, &table_row).await?;
        let indexes = query.index_rows(&self.table_name, &columns).await?;

        let mut table = Table::new(self.table_name.as_str());
        read_partition_keys(&mut table, &columns)?;
        read_clustering_columns(&mut table, &columns)?;
        read_data_columns(&mut table, &columns, &indexes)?;
        if self.config.read_properties {
            read_properties(&mut table, dialect, &table_row)?;
        }

        info!(
            partition_keys = table.partition_key_columns().len(),
            clustering = table.clustering_columns().len(),
            data = table.data_columns().len(),
            collections = table.collection_columns().len(),
            "Read table schema"
        );
        Ok(Some(table))
    }
}

/// Decode a key column's type, restoring an outer frozen wrapper
fn key_type(column: &ColumnRow) -> Result<TypeDescriptor> {
    let ty = decode(&column.type_encoding)?;
    Ok(if column.frozen {
        TypeDescriptor::frozen(ty)
    } else {
        ty
    })
}

fn read_partition_keys(table: &mut Table, columns: &TableColumns) -> Result<()> {
    for column in &columns.partition_keys {
        table.add_partition_key(column.name.as_str(), key_type(column)?)?;
    }

    if table.partition_key_columns().is_empty() {
        return Err(SchemaError::InvalidTable(format!(
            "{} has no partition key columns",
            table.name()
        )));
    }
    Ok(())
}

/// Columns and orders are paired by position, never by name
fn read_clustering_columns(table: &mut Table, columns: &TableColumns) -> Result<()> {
    if columns.clustering.len() != columns.clustering_orders.len() {
        return Err(SchemaError::MalformedMetadata(format!(
            "{} clustering columns but {} clustering orders",
            columns.clustering.len(),
            columns.clustering_orders.len()
        )));
    }

    for (column, order) in columns.clustering.iter().zip(&columns.clustering_orders) {
        let (ty, reversed) = decode(&column.type_encoding)?.into_unreversed();
        if reversed && *order == ClusteringOrder::Ascending {
            return Err(SchemaError::InconsistentClusteringOrder {
                column: column.name.clone(),
            });
        }
        let ty = if column.frozen {
            TypeDescriptor::frozen(ty)
        } else {
            ty
        };
        table.add_clustering_column(column.name.as_str(), ty, *order)?;
    }
    Ok(())
}

fn read_data_columns(table: &mut Table, columns: &TableColumns, indexes: &[IndexRow]) -> Result<()> {
    for column in &columns.regular {
        // At most one index per column; the first match wins
        let index_name = indexes
            .iter()
            .find(|index| index.target == column.name)
            .map(|index| index.name.clone());

        match &column.collection {
            Some(collection) => {
                let value = decode(&collection.value_type)?;
                let ty = match collection.kind {
                    CollectionKind::List => CollectionType::List(value),
                    CollectionKind::Set => CollectionType::Set(value),
                    CollectionKind::Map => {
                        let key = collection.key_type.as_deref().ok_or_else(|| {
                            SchemaError::MalformedMetadata(format!(
                                "map column {} has no key type",
                                column.name
                            ))
                        })?;
                        CollectionType::Map(decode(key)?, value)
                    }
                };
                table.add_collection_column(CollectionColumn {
                    name: column.name.clone(),
                    ty,
                    index_name,
                    is_static: column.is_static(),
                    is_frozen: column.frozen,
                })?;
            }
            None => {
                table.add_data_column(DataColumn {
                    name: column.name.clone(),
                    ty: decode(&column.type_encoding)?,
                    index_name,
                    is_static: column.is_static(),
                    is_frozen: column.frozen,
                })?;
            }
        }
    }
    Ok(())
}

fn read_properties(table: &mut Table, dialect: SchemaDialect, table_row: &Row) -> Result<()> {
    table.set_compact_storage(dialect.compact_storage(table_row));
    for (name, value) in dialect.properties(table_row)? {
        table.add_property(name, value);
    }
    Ok(())
}
