//! SQLite-backed [`StructuredStore`]. Table DDL, binds, and the
//! read-only `query` passthrough are all derived from [`Schema`] at runtime
//! — schema field declarations are the single source of truth.

use std::sync::Arc;

use chrono::Utc;
use recall_structured::{
    error::{Result, StructuredError},
    record::Record,
    schema::{FieldType, Schema},
    store::{ListOptions, QueryResult, StructuredStore},
};
use serde_json::Value;
use sqlx::{Column, Row, SqlitePool, sqlite::SqlitePoolOptions};
use uuid::Uuid;

/// SQLite-backed implementation of the structured store adapter contract.
#[derive(Debug, Clone)]
pub struct SqliteStructuredStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStructuredStore {
    /// Connects to `url` (a file path or `:memory:`).
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{url}?mode=rwc"))
            .await?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Adopts an already-connected pool, shared with [`crate::SqliteVectorStore`].
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn storage_err(e: sqlx::Error) -> StructuredError {
    StructuredError::Storage(anyhow::Error::new(e))
}

fn row_to_record(schema: &Schema, row: &sqlx::sqlite::SqliteRow) -> Result<Record> {
    let id: String = row.try_get("id").map_err(storage_err)?;
    let created_at: String = row.try_get("created_at").map_err(storage_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(storage_err)?;

    let mut fields = serde_json::Map::new();
    for field in &schema.fields {
        let value = match field.ty {
            FieldType::Number => row
                .try_get::<Option<f64>, _>(field.name.as_str())
                .map_err(storage_err)?
                .map_or(Value::Null, Value::from),
            FieldType::Boolean => row
                .try_get::<Option<i64>, _>(field.name.as_str())
                .map_err(storage_err)?
                .map_or(Value::Null, |b| Value::Bool(b != 0)),
            FieldType::Object | FieldType::Array => {
                let text: Option<String> = row.try_get(field.name.as_str()).map_err(storage_err)?;
                text.and_then(|t| serde_json::from_str(&t).ok()).unwrap_or(Value::Null)
            }
            FieldType::String | FieldType::DateAsIsoString | FieldType::Enum { .. } => row
                .try_get::<Option<String>, _>(field.name.as_str())
                .map_err(storage_err)?
                .map_or(Value::Null, Value::String),
        };
        fields.insert(field.name.clone(), value);
    }

    Ok(Record {
        id: Uuid::parse_str(&id).map_err(|e| StructuredError::Storage(anyhow::Error::new(e)))?,
        fields,
        created_at,
        updated_at,
    })
}

/// Binds a coerced JSON value positionally, matching the SQL column affinity
/// chosen for `ty` by [`FieldType::sql_type`].
fn bind_field<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ty: &FieldType,
    value: &Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match ty {
        FieldType::Number => query.bind(value.as_f64()),
        FieldType::Boolean => query.bind(value.as_bool().map(i64::from)),
        FieldType::Object | FieldType::Array => query.bind(serde_json::to_string(value).ok()),
        FieldType::String | FieldType::DateAsIsoString | FieldType::Enum { .. } => {
            query.bind(value.as_str().map(str::to_string))
        }
    }
}

impl StructuredStore for SqliteStructuredStore {
    async fn materialize(&self, schema: &Schema) -> Result<()> {
        let table = schema.table_name();
        let mut columns = vec!["id TEXT PRIMARY KEY".to_string(), "user_id TEXT NOT NULL".to_string()];
        for field in &schema.fields {
            columns.push(format!("{} {}", field.name, field.ty.sql_type()));
        }
        columns.push("created_at TEXT NOT NULL".to_string());
        columns.push("updated_at TEXT NOT NULL".to_string());

        let ddl = format!("CREATE TABLE IF NOT EXISTS {table} ({})", columns.join(", "));
        sqlx::query(&ddl).execute(&*self.pool).await.map_err(storage_err)?;

        let index_ddl = format!("CREATE INDEX IF NOT EXISTS idx_{table}_user_id ON {table}(user_id)");
        sqlx::query(&index_ddl).execute(&*self.pool).await.map_err(storage_err)?;
        Ok(())
    }

    async fn insert(&self, schema: &Schema, tenant: &str, fields: serde_json::Map<String, Value>) -> Result<Record> {
        let table = schema.table_name();
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        let mut columns = vec!["id".to_string(), "user_id".to_string()];
        let mut placeholders = vec!["?".to_string(), "?".to_string()];
        for field in &schema.fields {
            columns.push(field.name.clone());
            placeholders.push("?".to_string());
        }
        columns.push("created_at".to_string());
        columns.push("updated_at".to_string());
        placeholders.push("?".to_string());
        placeholders.push("?".to_string());

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql).bind(id.to_string()).bind(tenant.to_string());
        for field in &schema.fields {
            let value = fields.get(&field.name).cloned().unwrap_or(Value::Null);
            query = bind_field(query, &field.ty, &value);
        }
        query = query.bind(now.clone()).bind(now);
        query.execute(&*self.pool).await.map_err(storage_err)?;

        self.get(schema, id).await?.ok_or_else(|| StructuredError::RecordNotFound(id.to_string()))
    }

    async fn update(&self, schema: &Schema, id: Uuid, fields: serde_json::Map<String, Value>) -> Result<Record> {
        if fields.is_empty() {
            return self.get(schema, id).await?.ok_or_else(|| StructuredError::RecordNotFound(id.to_string()));
        }

        let table = schema.table_name();
        let mut assignments = Vec::new();
        let mut typed_values = Vec::new();
        for field in &schema.fields {
            if let Some(value) = fields.get(&field.name) {
                assignments.push(format!("{} = ?", field.name));
                typed_values.push((field.ty.clone(), value.clone()));
            }
        }
        assignments.push("updated_at = ?".to_string());

        let sql = format!("UPDATE {table} SET {} WHERE id = ?", assignments.join(", "));
        let mut query = sqlx::query(&sql);
        for (ty, value) in &typed_values {
            query = bind_field(query, ty, value);
        }
        query = query.bind(Utc::now().to_rfc3339()).bind(id.to_string());
        let outcome = query.execute(&*self.pool).await.map_err(storage_err)?;

        if outcome.rows_affected() == 0 {
            return Err(StructuredError::RecordNotFound(id.to_string()));
        }
        self.get(schema, id).await?.ok_or_else(|| StructuredError::RecordNotFound(id.to_string()))
    }

    async fn delete(&self, schema: &Schema, id: Uuid) -> Result<()> {
        let table = schema.table_name();
        sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id.to_string())
            .execute(&*self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, schema: &Schema, id: Uuid) -> Result<Option<Record>> {
        let table = schema.table_name();
        let row = sqlx::query(&format!("SELECT * FROM {table} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(|r| row_to_record(schema, r)).transpose()
    }

    async fn list(&self, schema: &Schema, tenant: &str, options: ListOptions) -> Result<Vec<Record>> {
        let table = schema.table_name();
        let limit = options.limit.map_or(-1, |l| l as i64);
        let offset = options.offset.unwrap_or(0) as i64;
        let rows = sqlx::query(&format!(
            "SELECT * FROM {table} WHERE user_id = ? ORDER BY created_at DESC, rowid ASC LIMIT ? OFFSET ?"
        ))
        .bind(tenant)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(|r| row_to_record(schema, r)).collect()
    }

    async fn find_by_field(&self, schema: &Schema, tenant: &str, field: &str, value: &str) -> Result<Option<Record>> {
        let table = schema.table_name();
        let row = sqlx::query(&format!(
            "SELECT * FROM {table} WHERE user_id = ? AND {field} = ? ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(tenant)
        .bind(value)
        .fetch_optional(&*self.pool)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(|r| row_to_record(schema, r)).transpose()
    }

    async fn get_most_recent(&self, schema: &Schema, tenant: &str) -> Result<Option<Record>> {
        let table = schema.table_name();
        let row = sqlx::query(&format!("SELECT * FROM {table} WHERE user_id = ? ORDER BY created_at DESC LIMIT 1"))
            .bind(tenant)
            .fetch_optional(&*self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(|r| row_to_record(schema, r)).transpose()
    }

    async fn search(&self, schema: &Schema, tenant: &str, field: &str, substring: &str) -> Result<Vec<Record>> {
        let table = schema.table_name();
        let rows = sqlx::query(&format!(
            "SELECT * FROM {table} WHERE user_id = ? ORDER BY created_at DESC LIMIT 100"
        ))
        .bind(tenant)
        .fetch_all(&*self.pool)
        .await
        .map_err(storage_err)?;

        let needle = substring.to_lowercase();
        rows.iter()
            .map(|r| row_to_record(schema, r))
            .collect::<Result<Vec<_>>>()
            .map(|records| {
                records
                    .into_iter()
                    .filter(|r| {
                        r.fields
                            .get(field)
                            .map(|v| match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .is_some_and(|v| v.to_lowercase().contains(&needle))
                    })
                    .collect()
            })
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let first_token = sql.trim().split_whitespace().next().unwrap_or_default();
        if !first_token.eq_ignore_ascii_case("select") {
            return Err(StructuredError::UnsafeQuery(sql.to_string()));
        }

        let rows = sqlx::query(sql).fetch_all(&*self.pool).await.map_err(storage_err)?;
        Ok(QueryResult { rows: rows.iter().map(dynamic_row_to_json).collect() })
    }
}

/// Converts an arbitrary `SELECT` result row into a JSON map without
/// knowing its shape ahead of time, trying integer, then float, then text
/// decoding for each column.
fn dynamic_row_to_json(row: &sqlx::sqlite::SqliteRow) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<i64, usize>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, usize>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<String, usize>(idx) {
            Value::String(v)
        } else {
            Value::Null
        };
        map.insert(column.name().to_string(), value);
    }
    map
}

#[cfg(test)]
mod tests {
    use recall_structured::schema::{FieldDef, FieldType};

    use super::*;

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

    async fn store() -> SqliteStructuredStore {
        let store = SqliteStructuredStore::connect(":memory:").await.unwrap();
        store.materialize(&payments_schema()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = store().await;
        let schema = payments_schema();
        let record = store.insert(&schema, "alice", payload("Jayden", 150.0)).await.unwrap();
        let fetched = store.get(&schema, record.id).await.unwrap().unwrap();
        assert_eq!(fetched.fields["amount"], serde_json::json!(150.0));
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let store = store().await;
        let schema = payments_schema();
        store.insert(&schema, "alice", payload("Jayden", 150.0)).await.unwrap();
        store.insert(&schema, "bob", payload("Jayden", 999.0)).await.unwrap();

        let alice_rows = store.list(&schema, "alice", ListOptions::default()).await.unwrap();
        assert_eq!(alice_rows.len(), 1);
        assert_eq!(alice_rows[0].fields["amount"], serde_json::json!(150.0));
    }

    #[tokio::test]
    async fn get_most_recent_returns_the_newest_row_not_the_oldest() {
        let store = store().await;
        let schema = payments_schema();
        store.insert(&schema, "alice", payload("Jayden", 150.0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newest = store.insert(&schema, "alice", payload("Jayden", 200.0)).await.unwrap();

        let most_recent = store.get_most_recent(&schema, "alice").await.unwrap().unwrap();
        assert_eq!(most_recent.id, newest.id);
        assert_eq!(most_recent.fields["amount"], serde_json::json!(200.0));
    }

    #[tokio::test]
    async fn rejects_non_select_statements() {
        let store = store().await;
        assert!(matches!(store.query("DROP TABLE payments").await, Err(StructuredError::UnsafeQuery(_))));
        assert!(matches!(
            store.query("INSERT INTO payments VALUES (1)").await,
            Err(StructuredError::UnsafeQuery(_))
        ));
    }

    #[tokio::test]
    async fn sum_aggregate_with_tenant_and_like_filter() {
        let store = store().await;
        let schema = payments_schema();
        store.insert(&schema, "alice", payload("Jayden", 150.0)).await.unwrap();
        store.insert(&schema, "alice", payload("Someone Else", 50.0)).await.unwrap();
        store.insert(&schema, "bob", payload("Jayden", 999.0)).await.unwrap();

        let result = store
            .query("SELECT SUM(amount) as total FROM payments WHERE user_id = 'alice' AND recipient LIKE '%Jayden%'")
            .await
            .unwrap();
        assert_eq!(result.rows[0]["total"], serde_json::json!(150.0));
    }
}
