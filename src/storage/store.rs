//! Generic document store
//!
//! Documents are JSON objects grouped in collections. The store offers the
//! small query surface the messaging core needs: equality predicates,
//! list-membership predicates over serialized list fields, ordering by a
//! numeric field and a result limit, plus partial updates and atomic
//! batches. `SqliteStore` keeps every collection in a single SQLite table.

use crate::{Error, Result};
use async_trait::async_trait;
use rusqlite::{params, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::sync::Mutex;

/// A stored document
pub type Document = Map<String, Value>;

/// Document collections used by the messaging core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Conversation records
    Conversations,
    /// Message records
    Messages,
}

impl Collection {
    /// Collection name in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversations => "conversations",
            Self::Messages => "messages",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// Query predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Top-level field equals the value
    Eq(String, Value),
    /// Top-level field holds a serialized string list containing the value
    ListContains(String, String),
}

/// List query over one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Predicates; all must match
    pub filters: Vec<Filter>,
    /// Numeric field to order by, ties broken by insertion order
    pub order_by: Option<(String, Order)>,
    /// Maximum number of documents returned
    pub limit: Option<usize>,
}

impl Query {
    /// Empty query matching everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality predicate
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    /// Add a list-membership predicate
    pub fn list_contains(mut self, field: &str, value: &str) -> Self {
        self.filters
            .push(Filter::ListContains(field.to_string(), value.to_string()));
        self
    }

    /// Order by a numeric field
    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.order_by = Some((field.to_string(), order));
        self
    }

    /// Limit the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every predicate
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(field, expected) => doc.get(field).unwrap_or(&Value::Null) == expected,
            Filter::ListContains(field, needle) => list_field_contains(doc.get(field), needle),
        })
    }
}

/// Membership test over a list stored either as a JSON string or an array
fn list_field_contains(field: Option<&Value>, needle: &str) -> bool {
    let items = match field {
        Some(Value::String(raw)) => match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(items) => items,
            Err(_) => return false,
        },
        Some(Value::Array(items)) => items.clone(),
        _ => return false,
    };
    items.iter().any(|item| item.as_str() == Some(needle))
}

/// A write applied as part of an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Insert a new document
    Create {
        /// Target collection
        collection: Collection,
        /// Document id
        id: String,
        /// Full document
        doc: Document,
    },
    /// Merge top-level fields into an existing document
    Update {
        /// Target collection
        collection: Collection,
        /// Document id
        id: String,
        /// Fields to overwrite
        patch: Document,
    },
}

/// Asynchronous document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List documents matching a query
    async fn list(&self, collection: Collection, query: &Query) -> Result<Vec<Document>>;

    /// Insert a new document; fails if the id already exists
    async fn create(&self, collection: Collection, id: &str, doc: Document) -> Result<()>;

    /// Merge fields into an existing document and return the merged result
    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document>;

    /// Apply several writes atomically: all of them or none
    async fn commit(&self, writes: Vec<Write>) -> Result<()>;

    /// Fetch one document by id
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let query = Query::new().eq("id", id).limit(1);
        Ok(self.list(collection, &query).await?.into_iter().next())
    }
}

/// SQLite-based document store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new store backed by a database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Initialize database schema
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            doc TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;

    Ok(())
}

/// Convert a JSON scalar into an SQL parameter comparable with `json_extract`
fn sql_param(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// JSON path for a top-level field
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn parse_document(raw: &str) -> Option<Document> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(doc)) => Some(doc),
        Ok(_) | Err(_) => {
            tracing::warn!("Skipping stored document that is not a JSON object");
            None
        }
    }
}

fn select(conn: &Connection, collection: Collection, query: &Query) -> Result<Vec<Document>> {
    let mut sql = String::from("SELECT doc FROM documents WHERE collection = ?1");
    let mut bound: Vec<SqlValue> = vec![SqlValue::Text(collection.as_str().to_string())];

    for filter in &query.filters {
        if let Filter::Eq(field, value) = filter {
            if value.is_null() {
                sql.push_str(&format!(
                    " AND json_extract(doc, '{}') IS NULL",
                    json_path(field)
                ));
            } else {
                bound.push(sql_param(value));
                sql.push_str(&format!(
                    " AND json_extract(doc, '{}') = ?{}",
                    json_path(field),
                    bound.len()
                ));
            }
        }
    }

    match &query.order_by {
        Some((field, Order::Ascending)) => sql.push_str(&format!(
            " ORDER BY json_extract(doc, '{}') ASC, rowid ASC",
            json_path(field)
        )),
        Some((field, Order::Descending)) => sql.push_str(&format!(
            " ORDER BY json_extract(doc, '{}') DESC, rowid DESC",
            json_path(field)
        )),
        None => sql.push_str(" ORDER BY rowid ASC"),
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(bound.iter()), |row| {
            row.get::<_, String>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // List-membership predicates run here so malformed payloads never fail the query
    let limit = query.limit.unwrap_or(usize::MAX);
    Ok(rows
        .iter()
        .filter_map(|raw| parse_document(raw))
        .filter(|doc| query.matches(doc))
        .take(limit)
        .collect())
}

fn insert(conn: &Connection, collection: Collection, id: &str, mut doc: Document) -> Result<()> {
    doc.insert("id".to_string(), Value::String(id.to_string()));
    let json = serde_json::to_string(&doc)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO documents (collection, id, doc) VALUES (?1, ?2, ?3)",
        params![collection.as_str(), id, json],
    )?;
    if inserted == 0 {
        return Err(Error::Storage(format!(
            "Document {}/{} already exists",
            collection.as_str(),
            id
        )));
    }
    Ok(())
}

fn merge(conn: &Connection, collection: Collection, id: &str, patch: Document) -> Result<Document> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT doc FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
            |row| row.get(0),
        )
        .optional()?;

    let raw = raw.ok_or_else(|| {
        Error::NotFound(format!("Document {}/{}", collection.as_str(), id))
    })?;
    let mut doc = parse_document(&raw).unwrap_or_default();

    for (key, value) in patch {
        if key != "id" {
            doc.insert(key, value);
        }
    }
    doc.insert("id".to_string(), Value::String(id.to_string()));

    conn.execute(
        "UPDATE documents SET doc = ?3 WHERE collection = ?1 AND id = ?2",
        params![collection.as_str(), id, serde_json::to_string(&doc)?],
    )?;
    Ok(doc)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list(&self, collection: Collection, query: &Query) -> Result<Vec<Document>> {
        let conn = self.conn.lock().await;
        select(&conn, collection, query)
    }

    async fn create(&self, collection: Collection, id: &str, doc: Document) -> Result<()> {
        let conn = self.conn.lock().await;
        insert(&conn, collection, id, doc)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Document> {
        let conn = self.conn.lock().await;
        merge(&conn, collection, id, patch)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for write in writes {
            match write {
                Write::Create { collection, id, doc } => insert(&tx, collection, &id, doc)?,
                Write::Update {
                    collection,
                    id,
                    patch,
                } => {
                    merge(&tx, collection, &id, patch)?;
                }
            }
        }
        // Dropping the transaction on an early return rolls everything back
        tx.commit()?;
        Ok(())
    }
}
