//! The structured store contract and an in-memory reference
//! implementation, including the hand-rolled `SELECT`-only SQL evaluator
//! used by [`StructuredStore::query`].

use core::future::Future;
use std::collections::HashMap;

use async_lock::RwLock;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{Result, StructuredError},
    record::Record,
    schema::Schema,
};

/// Pagination for [`StructuredStore::list`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListOptions {
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Result of a raw `SELECT` execution: one map per row, in result order.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<serde_json::Map<String, Value>>,
}

impl QueryResult {
    /// Unwraps a single-row, single-column result to its bare value
    /// (scalar aggregates are unwrapped to a bare value).
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        match self.rows.as_slice() {
            [row] if row.len() == 1 => row.values().next(),
            _ => None,
        }
    }
}

/// Dynamic-schema SQL table CRUD plus bounded read-only `SELECT` execution.
///
/// Table materialisation is idempotent. Writes use positional binds; table
/// and column names are sanitised, never quoted from the model.
pub trait StructuredStore: Send + Sync {
    /// Creates the table for `schema` if it doesn't already exist.
    fn materialize(&self, schema: &Schema) -> impl Future<Output = Result<()>> + Send;

    /// Inserts a validated, coerced payload, assigning a fresh id.
    fn insert(
        &self,
        schema: &Schema,
        tenant: &str,
        fields: serde_json::Map<String, Value>,
    ) -> impl Future<Output = Result<Record>> + Send;

    /// Applies a partial update. Fails with [`StructuredError::RecordNotFound`] if `id` is absent.
    fn update(
        &self,
        schema: &Schema,
        id: Uuid,
        fields: serde_json::Map<String, Value>,
    ) -> impl Future<Output = Result<Record>> + Send;

    /// Removes a row. Idempotent: a missing id is not an error.
    fn delete(&self, schema: &Schema, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// Fetches a single row by id.
    fn get(&self, schema: &Schema, id: Uuid) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Lists rows for a tenant, `created_at DESC`, stable within equal timestamps.
    fn list(
        &self,
        schema: &Schema,
        tenant: &str,
        options: ListOptions,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Finds the first row matching an exact field value, most-recent first.
    /// Lets the orchestrator resolve match-criteria without round-tripping
    /// SQL through the LLM.
    fn find_by_field(
        &self,
        schema: &Schema,
        tenant: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Returns the most recently created row for a tenant.
    fn get_most_recent(&self, schema: &Schema, tenant: &str) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Case-insensitive substring match on `field`, scanning up to the most
    /// recent 100 rows for the tenant (used by `searchRecords`).
    fn search(
        &self,
        schema: &Schema,
        tenant: &str,
        field: &str,
        substring: &str,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Executes a read-only statement. Refuses anything whose first token
    /// isn't `select` (case-insensitive) — the single safety gate for
    /// LLM-generated SQL.
    fn query(&self, sql: &str) -> impl Future<Output = Result<QueryResult>> + Send;
}

#[derive(Debug, Clone)]
struct StoredRow {
    id: Uuid,
    user_id: String,
    fields: serde_json::Map<String, Value>,
    created_at: String,
    updated_at: String,
}

impl StoredRow {
    fn as_record(&self) -> Record {
        Record {
            id: self.id,
            fields: self.fields.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    /// Full row view used by the SQL evaluator, `user_id` included.
    fn as_row_map(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        map.insert("user_id".to_string(), Value::String(self.user_id.clone()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        map.insert("created_at".to_string(), Value::String(self.created_at.clone()));
        map.insert("updated_at".to_string(), Value::String(self.updated_at.clone()));
        map
    }
}

/// Brute-force, non-durable [`StructuredStore`] for tests and prototyping.
/// Tables are keyed by their sanitised name; `query` runs a hand-rolled
/// `SELECT`-only evaluator over them rather than a real SQL engine.
#[derive(Debug, Default)]
pub struct InMemoryStructuredStore {
    tables: RwLock<HashMap<String, Vec<StoredRow>>>,
}

impl InMemoryStructuredStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructuredStore for InMemoryStructuredStore {
    async fn materialize(&self, schema: &Schema) -> Result<()> {
        self.tables.write().await.entry(schema.table_name()).or_default();
        Ok(())
    }

    async fn insert(&self, schema: &Schema, tenant: &str, fields: serde_json::Map<String, Value>) -> Result<Record> {
        let now = Utc::now().to_rfc3339();
        let row = StoredRow {
            id: Uuid::new_v4(),
            user_id: tenant.to_string(),
            fields,
            created_at: now.clone(),
            updated_at: now,
        };
        let record = row.as_record();
        self.tables.write().await.entry(schema.table_name()).or_default().push(row);
        Ok(record)
    }

    async fn update(&self, schema: &Schema, id: Uuid, fields: serde_json::Map<String, Value>) -> Result<Record> {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(schema.table_name()).or_default();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StructuredError::RecordNotFound(id.to_string()))?;
        for (k, v) in fields {
            row.fields.insert(k, v);
        }
        row.updated_at = Utc::now().to_rfc3339();
        Ok(row.as_record())
    }

    async fn delete(&self, schema: &Schema, id: Uuid) -> Result<()> {
        if let Some(rows) = self.tables.write().await.get_mut(&schema.table_name()) {
            rows.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn get(&self, schema: &Schema, id: Uuid) -> Result<Option<Record>> {
        Ok(self
            .tables
            .read()
            .await
            .get(&schema.table_name())
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .map(StoredRow::as_record))
    }

    async fn list(&self, schema: &Schema, tenant: &str, options: ListOptions) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&StoredRow> = tables
            .get(&schema.table_name())
            .into_iter()
            .flatten()
            .filter(|r| r.user_id == tenant)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = options.offset.unwrap_or(0);
        let iter = rows.into_iter().skip(offset);
        Ok(match options.limit {
            Some(limit) => iter.take(limit).map(StoredRow::as_record).collect(),
            None => iter.map(StoredRow::as_record).collect(),
        })
    }

    async fn find_by_field(&self, schema: &Schema, tenant: &str, field: &str, value: &str) -> Result<Option<Record>> {
        let tables = self.tables.read().await;
        let mut candidates: Vec<&StoredRow> = tables
            .get(&schema.table_name())
            .into_iter()
            .flatten()
            .filter(|r| r.user_id == tenant)
            .filter(|r| r.fields.get(field).map(value_as_text).as_deref() == Some(value))
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(candidates.first().map(|r| r.as_record()))
    }

    async fn get_most_recent(&self, schema: &Schema, tenant: &str) -> Result<Option<Record>> {
        let tables = self.tables.read().await;
        let mut candidates: Vec<&StoredRow> = tables
            .get(&schema.table_name())
            .into_iter()
            .flatten()
            .filter(|r| r.user_id == tenant)
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(candidates.first().map(|r| r.as_record()))
    }

    async fn search(&self, schema: &Schema, tenant: &str, field: &str, substring: &str) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&StoredRow> = tables
            .get(&schema.table_name())
            .into_iter()
            .flatten()
            .filter(|r| r.user_id == tenant)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let needle = substring.to_lowercase();
        Ok(rows
            .into_iter()
            .take(100)
            .filter(|r| {
                r.fields
                    .get(field)
                    .map(value_as_text)
                    .is_some_and(|v| v.to_lowercase().contains(&needle))
            })
            .map(StoredRow::as_record)
            .collect())
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let statement = sql::parse_select(sql)?;
        let tables = self.tables.read().await;
        let rows: Vec<serde_json::Map<String, Value>> = tables
            .get(&statement.table)
            .into_iter()
            .flatten()
            .map(StoredRow::as_row_map)
            .filter(|row| statement.matches(row))
            .collect();
        Ok(statement.project(rows))
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The hand-rolled `SELECT`-only evaluator ("Neither relies on parsing
/// the SQL"). Deliberately minimal: `SELECT <cols|aggregate> FROM <table>
/// [WHERE <cond> (AND <cond>)*]`, `=`/`LIKE` operators only. Enough to run
/// the tenant-scoped aggregate queries the query generator emits, without a
/// full parser or a new dependency.
mod sql {
    use serde_json::Value;

    use crate::error::{Result, StructuredError};

    #[derive(Debug)]
    pub(super) struct SelectStatement {
        pub(super) table: String,
        projection: Vec<Projection>,
        conditions: Vec<Condition>,
    }

    #[derive(Debug)]
    enum Projection {
        Star,
        Column(String),
        Aggregate { func: AggFunc, column: String, alias: String },
    }

    #[derive(Debug, Clone, Copy)]
    enum AggFunc {
        Sum,
        Count,
        Avg,
        Min,
        Max,
    }

    #[derive(Debug)]
    struct Condition {
        column: String,
        op: Op,
        value: String,
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Eq,
        Like,
    }

    impl SelectStatement {
        pub(super) fn matches(&self, row: &serde_json::Map<String, Value>) -> bool {
            self.conditions.iter().all(|cond| cond.matches(row))
        }

        pub(super) fn project(&self, rows: Vec<serde_json::Map<String, Value>>) -> super::QueryResult {
            if self.projection.iter().any(|p| matches!(p, Projection::Aggregate { .. })) {
                let mut out = serde_json::Map::new();
                for projection in &self.projection {
                    if let Projection::Aggregate { func, column, alias } = projection {
                        out.insert(alias.clone(), aggregate(*func, column, &rows));
                    }
                }
                return super::QueryResult { rows: vec![out] };
            }

            let projected = rows
                .into_iter()
                .map(|row| match self.projection.as_slice() {
                    [Projection::Star] => row,
                    columns => {
                        let mut out = serde_json::Map::new();
                        for projection in columns {
                            if let Projection::Column(name) = projection {
                                if let Some(v) = row.get(name) {
                                    out.insert(name.clone(), v.clone());
                                }
                            }
                        }
                        out
                    }
                })
                .collect();
            super::QueryResult { rows: projected }
        }
    }

    impl Condition {
        fn matches(&self, row: &serde_json::Map<String, Value>) -> bool {
            let Some(actual) = row.get(&self.column) else { return false };
            let actual = super::value_as_text(actual);
            match self.op {
                Op::Eq => actual == self.value,
                Op::Like => {
                    let pattern = self.value.trim_matches('%').to_lowercase();
                    actual.to_lowercase().contains(&pattern)
                }
            }
        }
    }

    fn aggregate(func: AggFunc, column: &str, rows: &[serde_json::Map<String, Value>]) -> Value {
        let numbers: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.get(column))
            .filter_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            })
            .collect();
        match func {
            AggFunc::Count => Value::from(rows.len() as i64),
            AggFunc::Sum => Value::from(numbers.iter().sum::<f64>()),
            AggFunc::Avg => {
                if numbers.is_empty() {
                    Value::Null
                } else {
                    Value::from(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggFunc::Min => numbers.iter().copied().fold(None, |acc, n| Some(acc.map_or(n, |m: f64| m.min(n)))).map_or(Value::Null, Value::from),
            AggFunc::Max => numbers.iter().copied().fold(None, |acc, n| Some(acc.map_or(n, |m: f64| m.max(n)))).map_or(Value::Null, Value::from),
        }
    }

    /// Verifies the first token is `select` and splits into clauses.
    pub(super) fn parse_select(sql: &str) -> Result<SelectStatement> {
        let trimmed = sql.trim();
        let first_token = trimmed.split_whitespace().next().unwrap_or_default();
        if !first_token.eq_ignore_ascii_case("select") {
            return Err(StructuredError::UnsafeQuery(sql.to_string()));
        }

        let upper = trimmed.to_uppercase();
        let from_pos = upper
            .find(" FROM ")
            .ok_or_else(|| StructuredError::QueryGeneration(format!("missing FROM clause: {sql}")))?;
        let select_list = trimmed[first_token.len()..from_pos].trim();

        let rest = &trimmed[from_pos + 6..];
        let where_pos = rest.to_uppercase().find(" WHERE ");
        let (table_part, where_part) = match where_pos {
            Some(pos) => (&rest[..pos], Some(rest[pos + 7..].trim())),
            None => (rest.trim(), None),
        };
        let table = table_part.split_whitespace().next().unwrap_or(table_part).trim().to_lowercase();

        let projection = parse_projection(select_list);
        let conditions = where_part.map(parse_conditions).unwrap_or_default();

        Ok(SelectStatement { table, projection, conditions })
    }

    fn parse_projection(select_list: &str) -> Vec<Projection> {
        if select_list.trim() == "*" {
            return vec![Projection::Star];
        }
        select_list
            .split(',')
            .map(str::trim)
            .map(|item| {
                if let Some((func_name, inner)) = item.split_once('(') {
                    let func = match func_name.trim().to_uppercase().as_str() {
                        "SUM" => AggFunc::Sum,
                        "COUNT" => AggFunc::Count,
                        "AVG" => AggFunc::Avg,
                        "MIN" => AggFunc::Min,
                        "MAX" => AggFunc::Max,
                        other => {
                            tracing::warn!(func = other, "unknown aggregate function, treating as column");
                            return Projection::Column(item.to_string());
                        }
                    };
                    let column = inner.trim_end_matches(')').trim().to_string();
                    Projection::Aggregate { func, alias: item.to_string(), column }
                } else {
                    Projection::Column(item.to_string())
                }
            })
            .collect()
    }

    fn parse_conditions(where_clause: &str) -> Vec<Condition> {
        where_clause
            .split(" AND ")
            .chain(where_clause.split(" and "))
            .filter(|s| !s.trim().is_empty())
            .filter_map(parse_condition)
            .collect()
    }

    fn parse_condition(clause: &str) -> Option<Condition> {
        let clause = clause.trim();
        let upper = clause.to_uppercase();
        let (column, op, raw_value) = if let Some(pos) = upper.find(" LIKE ") {
            (clause[..pos].trim(), Op::Like, clause[pos + 6..].trim())
        } else if let Some(pos) = clause.find('=') {
            (clause[..pos].trim(), Op::Eq, clause[pos + 1..].trim())
        } else {
            return None;
        };
        let value = raw_value.trim_matches(|c| c == '\'' || c == '"').to_string();
        Some(Condition { column: column.to_string(), op, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};

    fn payments_schema() -> Schema {
        Schema::new("payments", "desc")
            .with_field(FieldDef::required("recipient", FieldType::String))
            .with_field(FieldDef::required("amount", FieldType::Number))
    }

    fn payload(recipient: &str, amount: f64) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("recipient".into(), Value::String(recipient.into()));
        map.insert("amount".into(), Value::from(amount));
        map
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryStructuredStore::new();
        let schema = payments_schema();
        let record = store.insert(&schema, "alice", payload("Jayden", 150.0)).await.unwrap();
        let fetched = store.get(&schema, record.id).await.unwrap().unwrap();
        assert_eq!(fetched.fields["amount"], serde_json::json!(150.0));
    }

    #[tokio::test]
    async fn rejects_non_select_statements() {
        let store = InMemoryStructuredStore::new();
        assert!(matches!(
            store.query("DROP TABLE payments").await,
            Err(StructuredError::UnsafeQuery(_))
        ));
        assert!(matches!(
            store.query("INSERT INTO payments VALUES (1)").await,
            Err(StructuredError::UnsafeQuery(_))
        ));
    }

    #[tokio::test]
    async fn sum_aggregate_with_tenant_and_like_filter() {
        let store = InMemoryStructuredStore::new();
        let schema = payments_schema();
        store.insert(&schema, "alice", payload("Jayden", 150.0)).await.unwrap();
        store.insert(&schema, "alice", payload("Someone Else", 50.0)).await.unwrap();
        store.insert(&schema, "bob", payload("Jayden", 999.0)).await.unwrap();

        let result = store
            .query("SELECT SUM(amount) FROM payments WHERE user_id = 'alice' AND recipient LIKE '%Jayden%'")
            .await
            .unwrap();
        assert_eq!(result.scalar().cloned(), Some(serde_json::json!(150.0)));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = InMemoryStructuredStore::new();
        let schema = payments_schema();
        store.insert(&schema, "alice", payload("Jayden Smith", 10.0)).await.unwrap();
        let hits = store.search(&schema, "alice", "recipient", "jayden").await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
