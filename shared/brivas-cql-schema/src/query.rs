//! Metadata Queries

use tracing::debug;

use crate::dialect::{ColumnKind, ColumnRow, IndexRow, SchemaDialect};
use crate::session::{Keyspace, MetadataSession, Row};
use crate::table::ClusteringOrder;
use crate::Result;

/// Column rows of one table, split by role
#[derive(Debug, Clone, Default)]
pub struct TableColumns {
    /// In position order
    pub partition_keys: Vec<ColumnRow>,
    /// In position order
    pub clustering: Vec<ColumnRow>,
    /// Parallel to `clustering`
    pub clustering_orders: Vec<ClusteringOrder>,
    /// Regular, static and compact-value columns in metadata order
    pub regular: Vec<ColumnRow>,
}

impl TableColumns {
    fn all(&self) -> impl Iterator<Item = &ColumnRow> {
        self.partition_keys
            .iter()
            .chain(&self.clustering)
            .chain(&self.regular)
    }
}

/// Read-only system-table queries for one keyspace in one dialect
pub struct MetadataQuery<'k, S: ?Sized> {
    keyspace: &'k Keyspace<S>,
    dialect: SchemaDialect,
}

impl<'k, S: MetadataSession + ?Sized> MetadataQuery<'k, S> {
    pub fn new(keyspace: &'k Keyspace<S>, dialect: SchemaDialect) -> Self {
        Self { keyspace, dialect }
    }

    pub fn dialect(&self) -> SchemaDialect {
        self.dialect
    }

    /// The table's row, or `None` if the table does not exist
    pub async fn table_row(&self, table_name: &str) -> Result<Option<Row>> {
        let rows = self
            .keyspace
            .execute(self.dialect.table_query(), &[self.keyspace.name(), table_name])
            .await?;
        debug!(found = !rows.is_empty(), "Fetched table row");
        Ok(rows.into_iter().next())
    }

    pub async fn columns(&self, table_name: &str, table_row: &Row) -> Result<TableColumns> {
        let rows = self
            .keyspace
            .execute(self.dialect.columns_query(), &[self.keyspace.name(), table_name])
            .await?;

        let mut columns = rows
            .iter()
            .map(|row| self.dialect.parse_column(row))
            .collect::<Result<Vec<_>>>()?;
        let implicit = self.dialect.implicit_columns(table_row, &columns)?;
        if !implicit.is_empty() {
            debug!(count = implicit.len(), "Using columns declared on the table row");
        }
        columns.extend(implicit);

        let mut split = TableColumns::default();
        for column in columns {
            match column.kind {
                ColumnKind::PartitionKey => split.partition_keys.push(column),
                ColumnKind::Clustering => split.clustering.push(column),
                ColumnKind::Regular | ColumnKind::Static | ColumnKind::CompactValue => {
                    split.regular.push(column)
                }
            }
        }
        split.partition_keys.sort_by_key(|c| c.position);
        split.clustering.sort_by_key(|c| c.position);
        split.clustering_orders = self
            .dialect
            .clustering_orders(table_row, &split.clustering)?;

        debug!(
            partition_keys = split.partition_keys.len(),
            clustering = split.clustering.len(),
            regular = split.regular.len(),
            "Fetched column rows"
        );
        Ok(split)
    }

    /// Secondary indexes, in metadata order
    pub async fn index_rows(
        &self,
        table_name: &str,
        columns: &TableColumns,
    ) -> Result<Vec<IndexRow>> {
        let indexes = match self.dialect.indexes_query() {
            Some(cql) => self
                .keyspace
                .execute(cql, &[self.keyspace.name(), table_name])
                .await?
                .iter()
                .map(|row| self.dialect.parse_index(row))
                .collect::<Result<Vec<_>>>()?,
            None => columns
                .all()
                .filter_map(|column| {
                    column.index_name.as_ref().map(|name| IndexRow {
                        target: column.name.clone(),
                        name: name.clone(),
                    })
                })
                .collect(),
        };

        debug!(count = indexes.len(), "Fetched index rows");
        Ok(indexes)
    }
}
