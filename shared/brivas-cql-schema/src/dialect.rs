//! System Schema Dialects
//!
//! Servers before 3.0 describe tables in `system.schema_columnfamilies` and
//! `system.schema_columns`; 3.0 and later use the `system_schema` keyspace.
//! A [`SchemaDialect`] owns the statements for one layout and turns its rows
//! into the dialect-neutral [`ColumnRow`] and [`IndexRow`] records. Nothing
//! here decodes types: encodings are passed through as strings.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decoder::{collection_parts, composite_parts, is_reversed, strip_frozen};
use crate::session::Row;
use crate::table::ClusteringOrder;
use crate::types::CollectionKind;
use crate::{Result, SchemaError};

static INDEX_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:keys|values|entries|full)\((?P<column>.+)\)$").unwrap());

const MODERN_PROPERTIES: &[&str] = &[
    "bloom_filter_fp_chance",
    "caching",
    "comment",
    "compaction",
    "compression",
    "crc_check_chance",
    "dclocal_read_repair_chance",
    "default_time_to_live",
    "gc_grace_seconds",
    "max_index_interval",
    "memtable_flush_period_in_ms",
    "min_index_interval",
    "read_repair_chance",
    "speculative_retry",
];

const LEGACY_PROPERTIES: &[&str] = &[
    "bloom_filter_fp_chance",
    "caching",
    "comment",
    "dclocal_read_repair_chance",
    "default_time_to_live",
    "gc_grace_seconds",
    "index_interval",
    "max_index_interval",
    "memtable_flush_period_in_ms",
    "min_index_interval",
    "populate_io_cache_on_flush",
    "read_repair_chance",
    "replicate_on_write",
    "speculative_retry",
];

/// Which system-table layout a server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaDialect {
    /// `system.schema_*` (before 3.0)
    Legacy,
    /// `system_schema.*` (3.0 and later)
    Modern,
}

/// Role of a column in its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Regular,
    Static,
    CompactValue,
}

/// Undecoded element encodings of a collection column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEncoding {
    pub kind: CollectionKind,
    /// Maps only
    pub key_type: Option<String>,
    /// Element type for lists and sets, value type for maps
    pub value_type: String,
}

/// One column as described by either dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub name: String,
    pub kind: ColumnKind,
    /// Component position for key columns
    pub position: i32,
    /// Type encoding with any outer frozen wrapper removed
    pub type_encoding: String,
    pub collection: Option<CollectionEncoding>,
    pub frozen: bool,
    /// Declared sort order (modern rows only)
    pub clustering_order: Option<ClusteringOrder>,
    /// Index defined on the column (legacy rows only)
    pub index_name: Option<String>,
}

impl ColumnRow {
    fn new(name: String, kind: ColumnKind, position: i32, raw_type: &str) -> Self {
        let (unfrozen, frozen) = strip_frozen(raw_type);
        let collection = collection_parts(unfrozen).map(|(kind, key, value)| CollectionEncoding {
            kind,
            key_type: key.map(str::to_string),
            value_type: value.to_string(),
        });

        Self {
            name,
            kind,
            position,
            type_encoding: unfrozen.to_string(),
            collection,
            frozen,
            clustering_order: None,
            index_name: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.kind == ColumnKind::Static
    }
}

/// A secondary index and the column it targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub target: String,
    pub name: String,
}

impl SchemaDialect {
    /// Dialect for a `release_version` string: major version 3 and up is modern
    pub fn for_release_version(version: &str) -> Result<Self> {
        let major = version
            .trim()
            .split('.')
            .next()
            .and_then(|major| major.parse::<u32>().ok())
            .ok_or_else(|| SchemaError::UnsupportedReleaseVersion(version.to_string()))?;

        Ok(if major >= 3 { Self::Modern } else { Self::Legacy })
    }

    pub fn table_query(self) -> &'static str {
        match self {
            Self::Legacy => {
                "SELECT * FROM system.schema_columnfamilies \
                 WHERE keyspace_name = ? AND columnfamily_name = ?"
            }
            Self::Modern => {
                "SELECT * FROM system_schema.tables WHERE keyspace_name = ? AND table_name = ?"
            }
        }
    }

    pub fn columns_query(self) -> &'static str {
        match self {
            Self::Legacy => {
                "SELECT * FROM system.schema_columns \
                 WHERE keyspace_name = ? AND columnfamily_name = ?"
            }
            Self::Modern => {
                "SELECT * FROM system_schema.columns WHERE keyspace_name = ? AND table_name = ?"
            }
        }
    }

    /// Legacy servers keep index names on the column rows
    pub fn indexes_query(self) -> Option<&'static str> {
        match self {
            Self::Legacy => None,
            Self::Modern => Some(
                "SELECT * FROM system_schema.indexes WHERE keyspace_name = ? AND table_name = ?",
            ),
        }
    }

    pub fn table_names_query(self) -> &'static str {
        match self {
            Self::Legacy => {
                "SELECT columnfamily_name FROM system.schema_columnfamilies WHERE keyspace_name = ?"
            }
            Self::Modern => "SELECT table_name FROM system_schema.tables WHERE keyspace_name = ?",
        }
    }

    pub fn keyspace_query(self) -> &'static str {
        match self {
            Self::Legacy => {
                "SELECT keyspace_name FROM system.schema_keyspaces WHERE keyspace_name = ?"
            }
            Self::Modern => {
                "SELECT keyspace_name FROM system_schema.keyspaces WHERE keyspace_name = ?"
            }
        }
    }

    pub fn table_name_field(self) -> &'static str {
        match self {
            Self::Legacy => "columnfamily_name",
            Self::Modern => "table_name",
        }
    }

    pub fn table_name_of(self, row: &Row) -> Option<&str> {
        row.get_str(self.table_name_field())
    }

    pub fn parse_column(self, row: &Row) -> Result<ColumnRow> {
        match self {
            Self::Legacy => parse_legacy_column(row),
            Self::Modern => parse_modern_column(row),
        }
    }

    /// Key and compact-value columns that 1.2-era servers keep only on the table row
    pub fn implicit_columns(self, table: &Row, columns: &[ColumnRow]) -> Result<Vec<ColumnRow>> {
        match self {
            Self::Legacy if !columns.iter().any(|c| c.kind == ColumnKind::PartitionKey) => {
                legacy_implicit_columns(table, columns)
            }
            _ => Ok(Vec::new()),
        }
    }

    pub fn parse_index(self, row: &Row) -> Result<IndexRow> {
        let name = row
            .get_str("index_name")
            .ok_or_else(|| SchemaError::missing_field("index", "index_name"))?;
        let target = row
            .get_text_map("options")
            .and_then(|options| options.get("target").cloned())
            .ok_or_else(|| SchemaError::missing_field("index", "options.target"))?;

        Ok(IndexRow {
            target: index_target(&target),
            name: name.to_string(),
        })
    }

    /// Sort orders for `clustering`, which must already be in position order
    ///
    /// The result is parallel to `clustering`.
    pub fn clustering_orders(
        self,
        table: &Row,
        clustering: &[ColumnRow],
    ) -> Result<Vec<ClusteringOrder>> {
        match self {
            Self::Modern => Ok(clustering
                .iter()
                .map(|c| c.clustering_order.unwrap_or_default())
                .collect()),
            Self::Legacy => {
                if clustering.is_empty() {
                    return Ok(Vec::new());
                }
                let comparator = table
                    .get_str("comparator")
                    .ok_or_else(|| SchemaError::missing_field("table", "comparator"))?;
                let components = composite_parts(comparator).unwrap_or_else(|| vec![comparator]);
                if components.len() < clustering.len() {
                    return Err(SchemaError::MalformedMetadata(format!(
                        "comparator {} has fewer components than {} clustering columns",
                        comparator,
                        clustering.len()
                    )));
                }
                Ok(components
                    .iter()
                    .take(clustering.len())
                    .map(|component| {
                        if is_reversed(component) {
                            ClusteringOrder::Descending
                        } else {
                            ClusteringOrder::Ascending
                        }
                    })
                    .collect())
            }
        }
    }

    pub fn compact_storage(self, table: &Row) -> bool {
        match self {
            Self::Modern => {
                let flags = table.get_text_list("flags").unwrap_or_default();
                let has = |flag: &str| flags.iter().any(|f| f == flag);
                !has("compound") || has("dense") || has("super")
            }
            Self::Legacy => {
                table.get_bool("is_dense") == Some(true)
                    || table
                        .get_str("comparator")
                        .map_or(false, |c| composite_parts(c).is_none())
            }
        }
    }

    /// Storage properties, named the same way for both dialects
    pub fn properties(self, table: &Row) -> Result<BTreeMap<String, Value>> {
        let names = match self {
            Self::Legacy => LEGACY_PROPERTIES,
            Self::Modern => MODERN_PROPERTIES,
        };

        let mut properties = BTreeMap::new();
        for name in names {
            if let Some(value) = table.get(name) {
                properties.insert(name.to_string(), self.property_value(value)?);
            }
        }

        if self == Self::Legacy {
            if let Some(class) = table.get_str("compaction_strategy_class") {
                let mut compaction = match table.get("compaction_strategy_options") {
                    Some(options) => json_object(options, "compaction_strategy_options")?,
                    None => serde_json::Map::new(),
                };
                compaction.insert("class".to_string(), Value::String(class.to_string()));
                properties.insert("compaction".to_string(), Value::Object(compaction));
            }
            if let Some(compression) = table.get("compression_parameters") {
                properties.insert(
                    "compression".to_string(),
                    Value::Object(json_object(compression, "compression_parameters")?),
                );
            }
        }

        Ok(properties)
    }

    /// Legacy servers store some maps as JSON text
    fn property_value(self, value: &Value) -> Result<Value> {
        match (self, value) {
            (Self::Legacy, Value::String(text)) if text.trim_start().starts_with('{') => {
                serde_json::from_str(text).map_err(|e| {
                    SchemaError::MalformedMetadata(format!("invalid JSON property {}: {}", text, e))
                })
            }
            _ => Ok(value.clone()),
        }
    }
}

fn parse_kind(kind: &str) -> Result<ColumnKind> {
    match kind {
        "partition_key" => Ok(ColumnKind::PartitionKey),
        "clustering" | "clustering_key" => Ok(ColumnKind::Clustering),
        "regular" => Ok(ColumnKind::Regular),
        "static" => Ok(ColumnKind::Static),
        "compact_value" => Ok(ColumnKind::CompactValue),
        other => Err(SchemaError::MalformedMetadata(format!(
            "unknown column kind {}",
            other
        ))),
    }
}

fn required<'r>(row: &'r Row, field: &str) -> Result<&'r str> {
    row.get_str(field)
        .ok_or_else(|| SchemaError::missing_field("column", field))
}

fn parse_modern_column(row: &Row) -> Result<ColumnRow> {
    let name = required(row, "column_name")?;
    let kind = parse_kind(required(row, "kind")?)?;
    let position = row.get_i32("position").unwrap_or(-1);
    let mut column = ColumnRow::new(name.to_string(), kind, position, required(row, "type")?);

    column.clustering_order = match row.get_str("clustering_order") {
        Some("desc") => Some(ClusteringOrder::Descending),
        Some("asc") => Some(ClusteringOrder::Ascending),
        _ => None,
    };
    Ok(column)
}

fn parse_legacy_column(row: &Row) -> Result<ColumnRow> {
    let name = required(row, "column_name")?;
    // In schema_columns, `type` is the column's role; the data type is `validator`
    let kind = parse_kind(required(row, "type")?)?;
    let position = row.get_i32("component_index").unwrap_or(0);
    let mut column = ColumnRow::new(name.to_string(), kind, position, required(row, "validator")?);

    column.index_name = row.get_str("index_name").map(str::to_string);
    Ok(column)
}

fn legacy_implicit_columns(table: &Row, columns: &[ColumnRow]) -> Result<Vec<ColumnRow>> {
    let mut implicit = Vec::new();

    let key_validator = table
        .get_str("key_validator")
        .ok_or_else(|| SchemaError::missing_field("table", "key_validator"))?;
    let key_aliases = json_string_list(table, "key_aliases")?;
    let key_types = composite_parts(key_validator).unwrap_or_else(|| vec![key_validator]);
    for (i, ty) in key_types.iter().enumerate() {
        let name = key_aliases
            .get(i)
            .cloned()
            .unwrap_or_else(|| default_alias("key", i));
        implicit.push(ColumnRow::new(name, ColumnKind::PartitionKey, i as i32, ty));
    }

    let comparator = table
        .get_str("comparator")
        .ok_or_else(|| SchemaError::missing_field("table", "comparator"))?;
    let column_aliases = json_string_list(table, "column_aliases")?;
    let has_regular = columns.iter().any(|c| c.kind == ColumnKind::Regular);
    let clustering_types: Vec<&str> = match composite_parts(comparator) {
        Some(parts) => parts.into_iter().take(column_aliases.len()).collect(),
        // A non-composite comparator with regular columns names those columns
        None if has_regular => Vec::new(),
        None => vec![comparator],
    };
    for (i, ty) in clustering_types.iter().enumerate() {
        let name = column_aliases
            .get(i)
            .cloned()
            .unwrap_or_else(|| default_alias("column", i + 1));
        implicit.push(ColumnRow::new(name, ColumnKind::Clustering, i as i32, ty));
    }

    if SchemaDialect::Legacy.compact_storage(table) && !has_regular {
        let name = table
            .get_str("value_alias")
            .unwrap_or("value")
            .to_string();
        let ty = table
            .get_str("default_validator")
            .ok_or_else(|| SchemaError::missing_field("table", "default_validator"))?;
        implicit.push(ColumnRow::new(name, ColumnKind::CompactValue, 0, ty));
    }

    Ok(implicit)
}

/// `key`, `key2`, ... and `column1`, `column2`, ...
fn default_alias(prefix: &str, index: usize) -> String {
    match (prefix, index) {
        ("key", 0) => "key".to_string(),
        ("key", i) => format!("key{}", i + 1),
        (prefix, i) => format!("{}{}", prefix, i),
    }
}

/// A `list<text>` stored either natively or as JSON text
fn json_string_list(row: &Row, field: &str) -> Result<Vec<String>> {
    if let Some(list) = row.get_text_list(field) {
        return Ok(list);
    }
    match row.get_str(field) {
        Some(text) => serde_json::from_str(text).map_err(|e| {
            SchemaError::MalformedMetadata(format!("invalid {} {}: {}", field, text, e))
        }),
        None => Ok(Vec::new()),
    }
}

fn json_object(value: &Value, field: &str) -> Result<serde_json::Map<String, Value>> {
    let parsed = match value {
        Value::String(text) => serde_json::from_str(text).map_err(|e| {
            SchemaError::MalformedMetadata(format!("invalid {} {}: {}", field, text, e))
        })?,
        other => other.clone(),
    };
    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(SchemaError::MalformedMetadata(format!(
            "{} is not a map: {}",
            field, other
        ))),
    }
}

/// Column name from an index target such as `values(tags)` or `"Owner"`
fn index_target(target: &str) -> String {
    let column = INDEX_TARGET
        .captures(target)
        .and_then(|caps| caps.name("column"))
        .map_or(target, |m| m.as_str());
    unquote(column.trim())
}

fn unquote(identifier: &str) -> String {
    match identifier
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => identifier.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => Row::from(map),
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_dialect_for_release_version() {
        assert_eq!(SchemaDialect::for_release_version("2.1.22").unwrap(), SchemaDialect::Legacy);
        assert_eq!(SchemaDialect::for_release_version("3.0.8").unwrap(), SchemaDialect::Modern);
        assert_eq!(SchemaDialect::for_release_version("4.1.3").unwrap(), SchemaDialect::Modern);
        assert_eq!(SchemaDialect::for_release_version("10").unwrap(), SchemaDialect::Modern);
        assert!(matches!(
            SchemaDialect::for_release_version("unknown"),
            Err(SchemaError::UnsupportedReleaseVersion(_))
        ));
    }

    #[test]
    fn test_queries_are_parameterized() {
        for dialect in [SchemaDialect::Legacy, SchemaDialect::Modern] {
            assert_eq!(dialect.table_query().matches('?').count(), 2);
            assert_eq!(dialect.columns_query().matches('?').count(), 2);
            assert_eq!(dialect.table_names_query().matches('?').count(), 1);
        }
        assert!(SchemaDialect::Legacy.indexes_query().is_none());
        assert!(SchemaDialect::Modern
            .table_query()
            .contains("system_schema.tables"));
        assert!(SchemaDialect::Legacy
            .columns_query()
            .contains("system.schema_columns"));
    }

    #[test]
    fn test_parse_modern_frozen_collection() {
        let column = SchemaDialect::Modern
            .parse_column(&row(json!({
                "column_name": "tags",
                "kind": "regular",
                "position": -1,
                "clustering_order": "none",
                "type": "frozen<set<text>>",
            })))
            .unwrap();

        assert_eq!(column.kind, ColumnKind::Regular);
        assert!(column.frozen);
        assert_eq!(column.type_encoding, "set<text>");
        assert_eq!(
            column.collection,
            Some(CollectionEncoding {
                kind: CollectionKind::Set,
                key_type: None,
                value_type: "text".to_string(),
            })
        );
        assert_eq!(column.clustering_order, None);
    }

    #[test]
    fn test_parse_legacy_map_column() {
        let column = SchemaDialect::Legacy
            .parse_column(&row(json!({
                "column_name": "scores",
                "type": "regular",
                "component_index": 1,
                "validator": "org.apache.cassandra.db.marshal.MapType(org.apache.cassandra.db.marshal.UTF8Type,org.apache.cassandra.db.marshal.Int32Type)",
                "index_name": null,
            })))
            .unwrap();

        assert!(!column.frozen);
        let collection = column.collection.unwrap();
        assert_eq!(collection.kind, CollectionKind::Map);
        assert_eq!(
            collection.key_type.as_deref(),
            Some("org.apache.cassandra.db.marshal.UTF8Type")
        );
        assert_eq!(collection.value_type, "org.apache.cassandra.db.marshal.Int32Type");
        assert_eq!(column.index_name, None);
    }

    #[test]
    fn test_parse_column_rejects_unknown_kind() {
        let err = SchemaDialect::Modern
            .parse_column(&row(json!({
                "column_name": "x",
                "kind": "hidden",
                "type": "int",
            })))
            .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedMetadata(_)));

        let err = SchemaDialect::Modern
            .parse_column(&row(json!({"column_name": "x", "kind": "regular"})))
            .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedMetadata(_)));
    }

    #[test]
    fn test_index_targets() {
        assert_eq!(index_target("owner"), "owner");
        assert_eq!(index_target("values(tags)"), "tags");
        assert_eq!(index_target("keys(\"Scores\")"), "Scores");
        assert_eq!(index_target("\"say \"\"hi\"\"\""), "say \"hi\"");

        let index = SchemaDialect::Modern
            .parse_index(&row(json!({
                "index_name": "posts_owner_idx",
                "kind": "COMPOSITES",
                "options": {"target": "full(owner)"},
            })))
            .unwrap();
        assert_eq!(
            index,
            IndexRow {
                target: "owner".to_string(),
                name: "posts_owner_idx".to_string()
            }
        );
    }

    #[test]
    fn test_legacy_orders_from_comparator() {
        let table = row(json!({
            "comparator": "org.apache.cassandra.db.marshal.CompositeType(\
                org.apache.cassandra.db.marshal.Int32Type,\
                org.apache.cassandra.db.marshal.ReversedType(org.apache.cassandra.db.marshal.TimestampType),\
                org.apache.cassandra.db.marshal.UTF8Type)",
        }));
        let clustering = vec![
            ColumnRow::new("a".to_string(), ColumnKind::Clustering, 0, "Int32Type"),
            ColumnRow::new("b".to_string(), ColumnKind::Clustering, 1, "TimestampType"),
        ];

        assert_eq!(
            SchemaDialect::Legacy
                .clustering_orders(&table, &clustering)
                .unwrap(),
            vec![ClusteringOrder::Ascending, ClusteringOrder::Descending]
        );

        let four = [clustering.clone(), clustering.clone()].concat();
        assert!(matches!(
            SchemaDialect::Legacy.clustering_orders(&table, &four),
            Err(SchemaError::MalformedMetadata(_))
        ));
    }

    #[test]
    fn test_compact_storage_flags() {
        assert!(!SchemaDialect::Modern.compact_storage(&row(json!({"flags": ["compound"]}))));
        assert!(SchemaDialect::Modern.compact_storage(&row(json!({"flags": ["dense"]}))));
        assert!(SchemaDialect::Legacy.compact_storage(&row(json!({"comparator": "UTF8Type"}))));
        assert!(!SchemaDialect::Legacy
            .compact_storage(&row(json!({"comparator": "CompositeType(UTF8Type)"}))));
    }

    #[test]
    fn test_legacy_properties_fold_compaction() {
        let properties = SchemaDialect::Legacy
            .properties(&row(json!({
                "comment": "posts",
                "gc_grace_seconds": 864000,
                "caching": "{\"keys\":\"ALL\", \"rows_per_partition\":\"NONE\"}",
                "compaction_strategy_class": "org.apache.cassandra.db.compaction.SizeTieredCompactionStrategy",
                "compaction_strategy_options": "{\"min_threshold\":\"4\"}",
                "compression_parameters": "{\"sstable_compression\":\"org.apache.cassandra.io.compress.LZ4Compressor\"}",
            })))
            .unwrap();

        assert_eq!(properties["comment"], json!("posts"));
        assert_eq!(properties["caching"]["keys"], json!("ALL"));
        assert_eq!(
            properties["compaction"],
            json!({
                "class": "org.apache.cassandra.db.compaction.SizeTieredCompactionStrategy",
                "min_threshold": "4",
            })
        );
        assert_eq!(
            properties["compression"]["sstable_compression"],
            json!("org.apache.cassandra.io.compress.LZ4Compressor")
        );
    }

    #[test]
    fn test_legacy_implicit_columns() {
        let table = row(json!({
            "key_validator": "org.apache.cassandra.db.marshal.CompositeType(org.apache.cassandra.db.marshal.UUIDType,org.apache.cassandra.db.marshal.UTF8Type)",
            "key_aliases": "[\"tenant\",\"region\"]",
            "comparator": "org.apache.cassandra.db.marshal.ReversedType(org.apache.cassandra.db.marshal.TimeUUIDType)",
            "column_aliases": "[\"at\"]",
            "value_alias": "payload",
            "default_validator": "org.apache.cassandra.db.marshal.BytesType",
        }));

        let implicit = SchemaDialect::Legacy.implicit_columns(&table, &[]).unwrap();
        let summary: Vec<(&str, ColumnKind, i32)> = implicit
            .iter()
            .map(|c| (c.name.as_str(), c.kind, c.position))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("tenant", ColumnKind::PartitionKey, 0),
                ("region", ColumnKind::PartitionKey, 1),
                ("at", ColumnKind::Clustering, 0),
                ("payload", ColumnKind::CompactValue, 0),
            ]
        );
        assert!(SchemaDialect::Modern.implicit_columns(&table, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_default_aliases() {
        assert_eq!(default_alias("key", 0), "key");
        assert_eq!(default_alias("key", 1), "key2");
        assert_eq!(default_alias("column", 1), "column1");
    }
}
