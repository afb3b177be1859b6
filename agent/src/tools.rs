//! The six tools exposed to the agent loop and the per-run ordinal
//! table that keeps real record ids out of the model's view.
//!
//! Every tool returns its business outcome as `Ok(envelope_json)` — a
//! `{success, data?, error?}` string — reserving `Err` for genuine storage
//! failures. Validation and "unknown id" failures are business outcomes,
//! not storage failures, so the model can see them and retry.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_lock::Mutex;
use recall_core::llm::Tool;
use recall_structured::{
    schema::{Schema, SchemaRegistry},
    store::{ListOptions, StructuredStore},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Maps opaque ordinals (`"0"`, `"1"`, ...) handed to the model back to the
/// real row ids, for the lifetime of one [`crate::AgentClient::run`] call.
///
/// The model never sees a [`Uuid`] directly — real ids distort under repeated
/// model round-tripping, so a caller-side table maps short ordinals to them.
#[derive(Debug, Default)]
pub(crate) struct OrdinalTable {
    forward: HashMap<String, Uuid>,
}

impl OrdinalTable {
    fn assign(&mut self, id: Uuid) -> String {
        let ordinal = self.forward.len().to_string();
        self.forward.insert(ordinal.clone(), id);
        ordinal
    }

    fn resolve(&self, ordinal: &str) -> Option<Uuid> {
        self.forward.get(ordinal).copied()
    }
}

pub(crate) type SharedOrdinals = Arc<Mutex<OrdinalTable>>;

fn envelope_ok(data: Value) -> String {
    json!({"success": true, "data": data}).to_string()
}

fn envelope_err(error: impl Into<String>) -> String {
    json!({"success": false, "error": error.into()}).to_string()
}

fn resolve_schema<'a>(schemas: &'a SchemaRegistry, name: &str) -> Result<&'a Schema, String> {
    schemas.get(name).ok_or_else(|| format!("unknown schema '{name}'"))
}

async fn record_json(ordinals: &SharedOrdinals, id: Uuid, record: &recall_structured::record::Record) -> Value {
    let ordinal = ordinals.lock().await.assign(id);
    let mut fields = record.fields.clone();
    fields.insert("id".to_string(), Value::String(ordinal));
    fields.insert("createdAt".to_string(), Value::String(record.created_at.clone()));
    fields.insert("updatedAt".to_string(), Value::String(record.updated_at.clone()));
    Value::Object(fields)
}

/// Shared handles every tool needs: the store, the schema registry, the
/// tenant this run is scoped to, and the run's ordinal table.
pub(crate) struct ToolContext<STORE> {
    pub store: Arc<STORE>,
    pub schemas: Arc<SchemaRegistry>,
    pub tenant: String,
    pub ordinals: SharedOrdinals,
}

impl<STORE> Clone for ToolContext<STORE> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            schemas: self.schemas.clone(),
            tenant: self.tenant.clone(),
            ordinals: self.ordinals.clone(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListSchemasArgs {}

#[derive(Serialize)]
struct SchemaSummary<'a> {
    name: &'a str,
    description: &'a str,
    fields: Vec<FieldSummary<'a>>,
}

#[derive(Serialize)]
struct FieldSummary<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty: &'a recall_structured::schema::FieldType,
    required: bool,
}

pub(crate) struct ListSchemasTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for ListSchemasTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "listSchemas".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Lists the record schemas available to insert, update, query, or delete.".into()
    }

    type Arguments = ListSchemasArgs;

    async fn call(&mut self, _arguments: Self::Arguments) -> recall_core::Result {
        let summaries: Vec<_> = self
            .ctx
            .schemas
            .all()
            .map(|schema| SchemaSummary {
                name: &schema.name,
                description: &schema.description,
                fields: schema
                    .fields
                    .iter()
                    .map(|f| FieldSummary { name: &f.name, ty: &f.ty, required: f.required })
                    .collect(),
            })
            .collect();
        Ok(envelope_ok(serde_json::to_value(summaries)?))
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListRecordsArgs {
    /// Name of a schema returned by `listSchemas`.
    schema: String,
    /// Maximum rows to return, most recent first.
    #[serde(default = "default_limit")]
    limit: usize,
}

pub(crate) struct ListRecordsTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for ListRecordsTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "listRecords".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Lists the most recent rows of a schema for the current user.".into()
    }

    type Arguments = ListRecordsArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(schema) = resolve_schema(&self.ctx.schemas, &arguments.schema) else {
            return Ok(envelope_err(format!("unknown schema '{}'", arguments.schema)));
        };
        let records = self
            .ctx
            .store
            .list(schema, &self.ctx.tenant, ListOptions::default().with_limit(arguments.limit))
            .await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            rows.push(record_json(&self.ctx.ordinals, record.id, record).await);
        }
        Ok(envelope_ok(Value::Array(rows)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRecordArgs {
    schema: String,
    /// An id previously returned by `listRecords` or `searchRecords`.
    id: String,
}

pub(crate) struct GetRecordTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for GetRecordTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "getRecord".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Fetches a single row by the id returned from listRecords or searchRecords.".into()
    }

    type Arguments = GetRecordArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(schema) = resolve_schema(&self.ctx.schemas, &arguments.schema) else {
            return Ok(envelope_err(format!("unknown schema '{}'", arguments.schema)));
        };
        let Some(id) = self.ctx.ordinals.lock().await.resolve(&arguments.id) else {
            return Ok(envelope_err("unknown id; call listRecords or searchRecords first"));
        };
        match self.ctx.store.get(schema, id).await? {
            Some(record) => Ok(envelope_ok(record_json(&self.ctx.ordinals, id, &record).await)),
            None => Ok(envelope_err("record not found")),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchRecordsArgs {
    schema: String,
    /// Field to match against, cast to text.
    field: String,
    /// Case-insensitive substring to search for.
    value: String,
}

pub(crate) struct SearchRecordsTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for SearchRecordsTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "searchRecords".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Case-insensitive substring search over one field, scanning the most recent 100 rows."
            .into()
    }

    type Arguments = SearchRecordsArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(schema) = resolve_schema(&self.ctx.schemas, &arguments.schema) else {
            return Ok(envelope_err(format!("unknown schema '{}'", arguments.schema)));
        };
        let records = self
            .ctx
            .store
            .search(schema, &self.ctx.tenant, &arguments.field, &arguments.value)
            .await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            rows.push(record_json(&self.ctx.ordinals, record.id, record).await);
        }
        Ok(envelope_ok(Value::Array(rows)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InsertRecordArgs {
    schema: String,
    /// Field values matching the schema's declared fields.
    data: Value,
}

pub(crate) struct InsertRecordTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for InsertRecordTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "insertRecord".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Inserts a new row after validating data against the schema's declared fields.".into()
    }

    type Arguments = InsertRecordArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(schema) = resolve_schema(&self.ctx.schemas, &arguments.schema) else {
            return Ok(envelope_err(format!("unknown schema '{}'", arguments.schema)));
        };
        let Some(raw) = arguments.data.as_object() else {
            return Ok(envelope_err("data must be a JSON object"));
        };
        let fields = match schema.validate(raw, false) {
            Ok(fields) => fields,
            Err(recall_structured::StructuredError::SchemaValidation(issues)) => {
                return Ok(json!({"success": false, "error": "validation failed", "issues": issues_json(&issues)}).to_string());
            }
            Err(other) => return Err(anyhow::Error::new(other)),
        };
        let record = self.ctx.store.insert(schema, &self.ctx.tenant, fields).await?;
        Ok(envelope_ok(record_json(&self.ctx.ordinals, record.id, &record).await))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateRecordArgs {
    schema: String,
    /// An id previously returned by `listRecords` or `searchRecords`.
    id: String,
    /// Fields to overwrite; fields not present are left unchanged.
    data: Value,
}

pub(crate) struct UpdateRecordTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for UpdateRecordTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "updateRecord".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Applies a partial update to a row identified by an id from listRecords or searchRecords.".into()
    }

    type Arguments = UpdateRecordArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(schema) = resolve_schema(&self.ctx.schemas, &arguments.schema) else {
            return Ok(envelope_err(format!("unknown schema '{}'", arguments.schema)));
        };
        let Some(id) = self.ctx.ordinals.lock().await.resolve(&arguments.id) else {
            return Ok(envelope_err("unknown id; call listRecords or searchRecords first"));
        };
        let Some(raw) = arguments.data.as_object() else {
            return Ok(envelope_err("data must be a JSON object"));
        };
        let fields = match schema.validate(raw, true) {
            Ok(fields) => fields,
            Err(recall_structured::StructuredError::SchemaValidation(issues)) => {
                return Ok(json!({"success": false, "error": "validation failed", "issues": issues_json(&issues)}).to_string());
            }
            Err(other) => return Err(anyhow::Error::new(other)),
        };
        match self.ctx.store.update(schema, id, fields).await {
            Ok(record) => Ok(envelope_ok(record_json(&self.ctx.ordinals, id, &record).await)),
            Err(recall_structured::StructuredError::RecordNotFound(_)) => Ok(envelope_err("record not found")),
            Err(other) => Err(anyhow::Error::new(other)),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteRecordArgs {
    schema: String,
    /// An id previously returned by `listRecords` or `searchRecords`.
    id: String,
}

pub(crate) struct DeleteRecordTool<STORE> {
    pub ctx: ToolContext<STORE>,
}

impl<STORE: StructuredStore> Tool for DeleteRecordTool<STORE> {
    fn name(&self) -> Cow<'static, str> {
        "deleteRecord".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Deletes a row identified by an id from listRecords or searchRecords.".into()
    }

    type Arguments = DeleteRecordArgs;

    async fn call(&mut self, arguments: Self::Arguments) -> recall_core::Result {
        let Ok(schema) = resolve_schema(&self.ctx.schemas, &arguments.schema) else {
            return Ok(envelope_err(format!("unknown schema '{}'", arguments.schema)));
        };
        let Some(id) = self.ctx.ordinals.lock().await.resolve(&arguments.id) else {
            return Ok(envelope_err("unknown id; call listRecords or searchRecords first"));
        };
        self.ctx.store.delete(schema, id).await?;
        Ok(envelope_ok(json!({"id": arguments.id})))
    }
}

fn issues_json(issues: &[recall_structured::FieldIssue]) -> Value {
    Value::Array(
        issues
            .iter()
            .map(|issue| json!({"field": issue.field, "message": issue.message}))
            .collect(),
    )
}
