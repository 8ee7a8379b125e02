//! Table Schema Model

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{CollectionKind, TypeDescriptor};
use crate::{Result, SchemaError};

/// Sort direction of a clustering column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringOrder {
    #[default]
    Ascending,
    Descending,
}

impl ClusteringOrder {
    pub fn as_cql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for ClusteringOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_cql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKey {
    pub name: String,
    pub ty: TypeDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringColumn {
    pub name: String,
    pub ty: TypeDescriptor,
    pub order: ClusteringOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataColumn {
    pub name: String,
    pub ty: TypeDescriptor,
    pub index_name: Option<String>,
    pub is_static: bool,
    pub is_frozen: bool,
}

/// Element types of a collection column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    List(TypeDescriptor),
    Set(TypeDescriptor),
    Map(TypeDescriptor, TypeDescriptor),
}

impl CollectionType {
    pub fn kind(&self) -> CollectionKind {
        match self {
            Self::List(_) => CollectionKind::List,
            Self::Set(_) => CollectionKind::Set,
            Self::Map(..) => CollectionKind::Map,
        }
    }

    /// The equivalent (unfrozen) type descriptor
    pub fn to_descriptor(&self) -> TypeDescriptor {
        match self {
            Self::List(element) => TypeDescriptor::list(element.clone()),
            Self::Set(element) => TypeDescriptor::set(element.clone()),
            Self::Map(key, value) => TypeDescriptor::map(key.clone(), value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionColumn {
    pub name: String,
    pub ty: CollectionType,
    pub index_name: Option<String>,
    pub is_static: bool,
    pub is_frozen: bool,
}

/// Borrowed view of any column of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    PartitionKey(&'a PartitionKey),
    Clustering(&'a ClusteringColumn),
    Data(&'a DataColumn),
    Collection(&'a CollectionColumn),
}

impl<'a> ColumnRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::PartitionKey(c) => &c.name,
            Self::Clustering(c) => &c.name,
            Self::Data(c) => &c.name,
            Self::Collection(c) => &c.name,
        }
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        match self {
            Self::PartitionKey(c) => c.ty.clone(),
            Self::Clustering(c) => c.ty.clone(),
            Self::Data(c) => c.ty.clone(),
            Self::Collection(c) if c.is_frozen => TypeDescriptor::frozen(c.ty.to_descriptor()),
            Self::Collection(c) => c.ty.to_descriptor(),
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, Self::PartitionKey(_) | Self::Clustering(_))
    }
}

/// Full schema of one table
///
/// Columns are added partition keys first, then clustering columns, then
/// data and collection columns. A name may only be used once across all four.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    partition_key_columns: Vec<PartitionKey>,
    clustering_columns: Vec<ClusteringColumn>,
    data_columns: Vec<DataColumn>,
    collection_columns: Vec<CollectionColumn>,
    compact_storage: bool,
    properties: BTreeMap<String, serde_json::Value>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key_columns: Vec::new(),
            clustering_columns: Vec::new(),
            data_columns: Vec::new(),
            collection_columns: Vec::new(),
            compact_storage: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key_columns(&self) -> &[PartitionKey] {
        &self.partition_key_columns
    }

    pub fn clustering_columns(&self) -> &[ClusteringColumn] {
        &self.clustering_columns
    }

    pub fn data_columns(&self) -> &[DataColumn] {
        &self.data_columns
    }

    pub fn collection_columns(&self) -> &[CollectionColumn] {
        &self.collection_columns
    }

    pub fn compact_storage(&self) -> bool {
        self.compact_storage
    }

    pub fn properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }

    pub fn add_partition_key(&mut self, name: impl Into<String>, ty: TypeDescriptor) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        if !self.clustering_columns.is_empty() || self.has_non_key_columns() {
            return Err(self.out_of_order(&name, "partition key"));
        }
        self.partition_key_columns.push(PartitionKey { name, ty });
        Ok(())
    }

    pub fn add_clustering_column(
        &mut self,
        name: impl Into<String>,
        ty: TypeDescriptor,
        order: ClusteringOrder,
    ) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        if self.has_non_key_columns() {
            return Err(self.out_of_order(&name, "clustering column"));
        }
        self.clustering_columns
            .push(ClusteringColumn { name, ty, order });
        Ok(())
    }

    pub fn add_data_column(&mut self, column: DataColumn) -> Result<()> {
        self.ensure_unique(&column.name)?;
        self.data_columns.push(column);
        Ok(())
    }

    pub fn add_collection_column(&mut self, column: CollectionColumn) -> Result<()> {
        self.ensure_unique(&column.name)?;
        self.collection_columns.push(column);
        Ok(())
    }

    pub fn set_compact_storage(&mut self, compact_storage: bool) {
        self.compact_storage = compact_storage;
    }

    pub fn add_property(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(name.into(), value);
    }

    pub fn column(&self, name: &str) -> Option<ColumnRef<'_>> {
        self.columns().find(|c| c.name() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Every column: keys in key order, then data and collection columns
    pub fn columns(&self) -> impl Iterator<Item = ColumnRef<'_>> {
        self.partition_key_columns
            .iter()
            .map(ColumnRef::PartitionKey)
            .chain(self.clustering_columns.iter().map(ColumnRef::Clustering))
            .chain(self.data_columns.iter().map(ColumnRef::Data))
            .chain(self.collection_columns.iter().map(ColumnRef::Collection))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns().map(|c| c.name()).collect()
    }

    /// Primary key column names, partition keys first
    pub fn key_column_names(&self) -> Vec<&str> {
        self.columns()
            .filter(|c| c.is_key())
            .map(|c| c.name())
            .collect()
    }

    pub fn partition_key_column(&self, name: &str) -> Option<&PartitionKey> {
        self.partition_key_columns.iter().find(|c| c.name == name)
    }

    pub fn clustering_column(&self, name: &str) -> Option<&ClusteringColumn> {
        self.clustering_columns.iter().find(|c| c.name == name)
    }

    pub fn data_column(&self, name: &str) -> Option<&DataColumn> {
        self.data_columns.iter().find(|c| c.name == name)
    }

    pub fn collection_column(&self, name: &str) -> Option<&CollectionColumn> {
        self.collection_columns.iter().find(|c| c.name == name)
    }

    fn has_non_key_columns(&self) -> bool {
        !self.data_columns.is_empty() || !self.collection_columns.is_empty()
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            return Err(SchemaError::DuplicateColumn {
                table: self.name.clone(),
                column: name.to_string(),
            });
        }
        Ok(())
    }

    fn out_of_order(&self, column: &str, role: &str) -> SchemaError {
        SchemaError::InvalidTable(format!(
            "{} {} added to {} after non-key columns",
            role, column, self.name
        ))
    }
}
