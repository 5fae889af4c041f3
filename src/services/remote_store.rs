//! Remote store client contract for Stashed.
//!
//! The reconcilers speak to the shared multi-user backend through the
//! [`RemoteStore`] trait: a small CRUD surface (select, insert, update,
//! delete, upsert-on-conflict) with authorization carried as an access
//! token attached per call. Row-level security, indexing, and persistence
//! are the backend's problem.
//!
//! [`HttpRemoteStore`] renders PostgREST-style requests against the real
//! backend. [`InMemoryRemoteStore`] is the in-process double used by the
//! test suite and local development.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::types::errors::RemoteError;

// === Filter / Order ===

#[derive(Debug, Clone)]
enum Clause {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// Conjunction of column predicates. Supports the two shapes the
/// reconcilers need: equality and membership.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(column.to_string(), value.into()));
        self
    }

    /// `column IN (values...)`
    pub fn is_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::In(column.to_string(), values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluates the filter against a JSON row. Used by the in-memory store.
    pub fn matches(&self, row: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Eq(col, v) => row.get(col) == Some(v),
            Clause::In(col, vs) => row.get(col).is_some_and(|rv| vs.contains(rv)),
        })
    }

    /// Renders the filter as PostgREST query pairs: `col=eq.v`, `col=in.(a,b)`.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.clauses
            .iter()
            .map(|clause| match clause {
                Clause::Eq(col, v) => (col.clone(), format!("eq.{}", literal(v))),
                Clause::In(col, vs) => {
                    let joined = vs.iter().map(literal).collect::<Vec<_>>().join(",");
                    (col.clone(), format!("in.({})", joined))
                }
            })
            .collect()
    }
}

/// Renders a JSON value as a PostgREST literal (strings unquoted).
fn literal(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sort directive for `select`.
#[derive(Debug, Clone)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }

    /// Renders the directive as a PostgREST `order=` value.
    pub fn to_query_value(&self) -> String {
        if self.descending {
            format!("{}.desc", self.column)
        } else {
            format!("{}.asc", self.column)
        }
    }
}

// === Contract ===

/// Abstract CRUD surface of the shared remote store.
///
/// Every call carries the caller's access token; a rejected token surfaces
/// as [`RemoteError::Unauthorized`] and uniqueness violations as
/// [`RemoteError::Conflict`] so callers can branch on kind rather than
/// sniffing messages.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the rows of `table` matching `filter`, optionally sorted.
    async fn select(
        &self,
        token: &str,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, RemoteError>;

    /// Inserts rows and returns the first inserted row as stored
    /// (ids and defaults assigned by the store).
    async fn insert(
        &self,
        token: &str,
        table: &str,
        rows: Vec<Value>,
    ) -> Result<Value, RemoteError>;

    /// Applies a partial update to the row with the given id and returns it.
    async fn update(
        &self,
        token: &str,
        table: &str,
        id: &str,
        patch: Value,
    ) -> Result<Value, RemoteError>;

    /// Deletes the rows matching `filter`.
    async fn delete(&self, token: &str, table: &str, filter: &Filter) -> Result<(), RemoteError>;

    /// Inserts rows, merging with existing rows that share the conflict
    /// key columns. Calling twice with the same rows is a no-op.
    async fn upsert(
        &self,
        token: &str,
        table: &str,
        rows: Vec<Value>,
        conflict_keys: &[&str],
    ) -> Result<(), RemoteError>;
}

// === HTTP implementation ===

/// PostgREST-style client for the real backend.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, url: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(RemoteError::Unauthorized),
            409 => Err(RemoteError::Conflict(message)),
            code => Err(RemoteError::Http { status: code, message }),
        }
    }

    async fn rows(resp: reqwest::Response) -> Result<Vec<Value>, RemoteError> {
        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn select(
        &self,
        token: &str,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, RemoteError> {
        let mut query = filter.to_query_pairs();
        query.push(("select".to_string(), "*".to_string()));
        if let Some(order) = order {
            query.push(("order".to_string(), order.to_query_value()));
        }

        let resp = self
            .request(reqwest::Method::GET, &self.table_url(table), token)
            .query(&query)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::rows(Self::check(resp).await?).await
    }

    async fn insert(
        &self,
        token: &str,
        table: &str,
        rows: Vec<Value>,
    ) -> Result<Value, RemoteError> {
        let resp = self
            .request(reqwest::Method::POST, &self.table_url(table), token)
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let mut inserted = Self::rows(Self::check(resp).await?).await?;
        if inserted.is_empty() {
            return Err(RemoteError::Serialization(
                "insert returned no representation".to_string(),
            ));
        }
        Ok(inserted.remove(0))
    }

    async fn update(
        &self,
        token: &str,
        table: &str,
        id: &str,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.table_url(table), token)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let mut updated = Self::rows(Self::check(resp).await?).await?;
        if updated.is_empty() {
            return Err(RemoteError::Http {
                status: 404,
                message: format!("no row with id {} in {}", id, table),
            });
        }
        Ok(updated.remove(0))
    }

    async fn delete(&self, token: &str, table: &str, filter: &Filter) -> Result<(), RemoteError> {
        let resp = self
            .request(reqwest::Method::DELETE, &self.table_url(table), token)
            .query(&filter.to_query_pairs())
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn upsert(
        &self,
        token: &str,
        table: &str,
        rows: Vec<Value>,
        conflict_keys: &[&str],
    ) -> Result<(), RemoteError> {
        let resp = self
            .request(reqwest::Method::POST, &self.table_url(table), token)
            .query(&[("on_conflict", conflict_keys.join(","))])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&rows)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }
}

// === In-memory implementation ===

/// In-process store double: JSON rows in a table map, uuid-assigned ids,
/// configurable unique indexes, and an optional expected access token for
/// exercising 401 paths.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    unique_indexes: Vec<(String, Vec<String>)>,
    expected_token: Mutex<Option<String>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a unique index; inserts violating it fail with
    /// [`RemoteError::Conflict`], mirroring the backend's constraints.
    pub fn with_unique_index(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique_indexes.push((
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// After this call, any operation carrying a different token fails
    /// with [`RemoteError::Unauthorized`].
    pub fn require_token(&self, token: &str) {
        *lock(&self.expected_token) = Some(token.to_string());
    }

    /// Seeds a row directly, bypassing token and index checks. Assigns an
    /// id when the row has none, and returns the stored copy.
    pub fn seed(&self, table: &str, mut row: Value) -> Value {
        ensure_id(&mut row);
        let mut tables = lock(&self.tables);
        tables.entry(table.to_string()).or_default().push(row.clone());
        row
    }

    /// Snapshot of a table's rows, for assertions.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    fn check_token(&self, token: &str) -> Result<(), RemoteError> {
        match lock(&self.expected_token).as_deref() {
            Some(expected) if expected != token => Err(RemoteError::Unauthorized),
            _ => Ok(()),
        }
    }

    fn conflict_for(&self, table: &str, row: &Value, existing: &[Value]) -> Option<String> {
        for (t, columns) in &self.unique_indexes {
            if t != table {
                continue;
            }
            let collides = existing.iter().any(|other| {
                columns
                    .iter()
                    .all(|col| row.get(col).is_some() && row.get(col) == other.get(col))
            });
            if collides {
                return Some(format!(
                    "duplicate key value violates unique index on {}({})",
                    table,
                    columns.join(", ")
                ));
            }
        }
        None
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn ensure_id(row: &mut Value) {
    if let Value::Object(map) = row {
        map.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn select(
        &self,
        token: &str,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Value>, RemoteError> {
        self.check_token(token)?;
        let tables = lock(&self.tables);
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let cmp = compare(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.descending {
                    cmp.reverse()
                } else {
                    cmp
                }
            });
        }
        Ok(rows)
    }

    async fn insert(
        &self,
        token: &str,
        table: &str,
        rows: Vec<Value>,
    ) -> Result<Value, RemoteError> {
        self.check_token(token)?;
        let mut tables = lock(&self.tables);
        let stored = tables.entry(table.to_string()).or_default();

        let mut first = None;
        for mut row in rows {
            if let Some(message) = self.conflict_for(table, &row, stored) {
                return Err(RemoteError::Conflict(message));
            }
            ensure_id(&mut row);
            if first.is_none() {
                first = Some(row.clone());
            }
            stored.push(row);
        }
        first.ok_or_else(|| RemoteError::Serialization("insert of zero rows".to_string()))
    }

    async fn update(
        &self,
        token: &str,
        table: &str,
        id: &str,
        patch: Value,
    ) -> Result<Value, RemoteError> {
        self.check_token(token)?;
        let mut tables = lock(&self.tables);
        let rows = tables.entry(table.to_string()).or_default();
        let target = rows
            .iter_mut()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
            .ok_or(RemoteError::Http {
                status: 404,
                message: format!("no row with id {} in {}", id, table),
            })?;
        if let (Value::Object(row), Value::Object(fields)) = (&mut *target, &patch) {
            for (k, v) in fields {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(target.clone())
    }

    async fn delete(&self, token: &str, table: &str, filter: &Filter) -> Result<(), RemoteError> {
        self.check_token(token)?;
        let mut tables = lock(&self.tables);
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        token: &str,
        table: &str,
        rows: Vec<Value>,
        conflict_keys: &[&str],
    ) -> Result<(), RemoteError> {
        self.check_token(token)?;
        let mut tables = lock(&self.tables);
        let stored = tables.entry(table.to_string()).or_default();

        for mut row in rows {
            let position = stored.iter().position(|other| {
                conflict_keys
                    .iter()
                    .all(|col| row.get(*col).is_some() && row.get(*col) == other.get(*col))
            });
            match position {
                Some(i) => {
                    if let (Value::Object(target), Value::Object(fields)) = (&mut stored[i], &row)
                    {
                        for (k, v) in fields {
                            target.insert(k.clone(), v.clone());
                        }
                    }
                }
                None => {
                    ensure_id(&mut row);
                    stored.push(row);
                }
            }
        }
        Ok(())
    }
}
