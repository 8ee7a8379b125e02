//! In-memory session and system-table fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brivas_cql_schema::{Keyspace, MetadataSession, QueryError, Row, SchemaDialect};
use serde_json::{json, Value};

pub const KEYSPACE: &str = "blog";
pub const TABLE: &str = "posts";

/// Answers statements from canned rows, keyed by statement text
pub struct FakeSession {
    release_version: String,
    responses: HashMap<String, Vec<Row>>,
    failing: Option<String>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    version_calls: AtomicUsize,
}

impl FakeSession {
    pub fn new(release_version: &str) -> Self {
        Self {
            release_version: release_version.to_string(),
            responses: HashMap::new(),
            failing: None,
            calls: Mutex::new(Vec::new()),
            version_calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(mut self, cql: &str, rows: Vec<Value>) -> Self {
        self.responses
            .insert(cql.to_string(), rows.into_iter().map(row).collect());
        self
    }

    pub fn fail_on(mut self, cql: &str) -> Self {
        self.failing = Some(cql.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    pub fn into_keyspace(self) -> (Arc<Self>, Keyspace<FakeSession>) {
        let session = Arc::new(self);
        let keyspace = Keyspace::new(Arc::clone(&session), KEYSPACE);
        (session, keyspace)
    }
}

#[async_trait]
impl MetadataSession for FakeSession {
    async fn execute(&self, cql: &str, values: &[&str]) -> Result<Vec<Row>, QueryError> {
        self.calls.lock().unwrap().push((
            cql.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        ));

        if self.failing.as_deref() == Some(cql) {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(self.responses.get(cql).cloned().unwrap_or_default())
    }

    async fn release_version(&self) -> Result<String, QueryError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.release_version.clone())
    }
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => Row::from(map),
        other => panic!("fixture row is not an object: {}", other),
    }
}

fn marshal(class: &str) -> String {
    format!("org.apache.cassandra.db.marshal.{}", class)
}

/// `posts` as a 3.0+ server describes it:
///
/// ```text
/// CREATE TABLE blog.posts (
///     id uuid,
///     created_at timestamp,
///     owner text STATIC,
///     tags frozen<set<text>>,
///     body text,
///     scores map<text, int>,
///     PRIMARY KEY (id, created_at)
/// ) WITH CLUSTERING ORDER BY (created_at DESC);
/// CREATE INDEX owner_idx ON blog.posts (owner);
/// ```
pub fn modern_posts() -> FakeSession {
    let dialect = SchemaDialect::Modern;
    FakeSession::new("3.11.4")
        .respond(
            dialect.table_query(),
            vec![json!({
                "keyspace_name": KEYSPACE,
                "table_name": TABLE,
                "flags": ["compound"],
                "comment": "",
                "gc_grace_seconds": 864000,
            })],
        )
        .respond(
            dialect.columns_query(),
            vec![
                json!({"column_name": "body", "kind": "regular", "position": -1,
                       "clustering_order": "none", "type": "text"}),
                json!({"column_name": "created_at", "kind": "clustering", "position": 0,
                       "clustering_order": "desc", "type": "timestamp"}),
                json!({"column_name": "id", "kind": "partition_key", "position": 0,
                       "clustering_order": "none", "type": "uuid"}),
                json!({"column_name": "owner", "kind": "static", "position": -1,
                       "clustering_order": "none", "type": "text"}),
                json!({"column_name": "scores", "kind": "regular", "position": -1,
                       "clustering_order": "none", "type": "map<text, int>"}),
                json!({"column_name": "tags", "kind": "regular", "position": -1,
                       "clustering_order": "none", "type": "frozen<set<text>>"}),
            ],
        )
        .respond(
            dialect.indexes_query().unwrap(),
            vec![json!({
                "index_name": "owner_idx",
                "kind": "COMPOSITES",
                "options": {"target": "owner"},
            })],
        )
}

/// The same `posts` table as a 2.x server describes it
pub fn legacy_posts() -> FakeSession {
    let dialect = SchemaDialect::Legacy;
    FakeSession::new("2.1.22")
        .respond(
            dialect.table_query(),
            vec![json!({
                "keyspace_name": KEYSPACE,
                "columnfamily_name": TABLE,
                "comparator": format!(
                    "{}({}({}),{},{}({}:{}({},{})))",
                    marshal("CompositeType"),
                    marshal("ReversedType"),
                    marshal("TimestampType"),
                    marshal("UTF8Type"),
                    marshal("ColumnToCollectionType"),
                    "73636f726573",
                    marshal("MapType"),
                    marshal("UTF8Type"),
                    marshal("Int32Type"),
                ),
                "is_dense": false,
                "key_validator": marshal("UUIDType"),
                "key_aliases": "[\"id\"]",
                "column_aliases": "[\"created_at\"]",
                "default_validator": marshal("BytesType"),
                "comment": "",
                "gc_grace_seconds": 864000,
            })],
        )
        .respond(
            dialect.columns_query(),
            vec![
                json!({"column_name": "body", "type": "regular", "component_index": 1,
                       "validator": marshal("UTF8Type"), "index_name": null}),
                json!({"column_name": "created_at", "type": "clustering_key", "component_index": 0,
                       "validator": format!("{}({})", marshal("ReversedType"), marshal("TimestampType")),
                       "index_name": null}),
                json!({"column_name": "id", "type": "partition_key", "component_index": null,
                       "validator": marshal("UUIDType"), "index_name": null}),
                json!({"column_name": "owner", "type": "static", "component_index": 1,
                       "validator": marshal("UTF8Type"), "index_name": "owner_idx"}),
                json!({"column_name": "scores", "type": "regular", "component_index": 1,
                       "validator": format!("{}({},{})", marshal("MapType"), marshal("UTF8Type"), marshal("Int32Type")),
                       "index_name": null}),
                json!({"column_name": "tags", "type": "regular", "component_index": 1,
                       "validator": format!("{}({}({}))", marshal("FrozenType"), marshal("SetType"), marshal("UTF8Type")),
                       "index_name": null}),
            ],
        )
}
