//! Row-level shapes shared by the intent processor, the structured client,
//! and the store: the wire transport for extracted field values and the
//! projected record a caller gets back.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{FieldType, Schema};

/// A single `{field, value, type}` triple as the extraction envelope
/// transports it. The LLM never emits typed JSON directly — only strings —
/// so the server performs every coercion ("Data is transported as a
/// list of triples and converted server-side, so the LLM cannot emit
/// unexpected keys").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldValue {
    /// Declared field name this value belongs to.
    pub field: String,
    /// Raw string form, as the model produced it.
    pub value: String,
    /// The field's declared type, echoed so coercion doesn't need a schema
    /// lookup inside the deserializer.
    #[serde(rename = "type")]
    pub ty: FieldValueType,
}

/// Wire-level type tag carried alongside a [`FieldValue`]. Mirrors
/// [`FieldType`] but flattens the variants with data (`enum`, `object`,
/// `array`) to bare tags, since the transport only ever carries a string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldValueType {
    String,
    Number,
    Boolean,
    DateAsIsoString,
    Enum,
    Object,
    Array,
}

/// Converts a list of `{field, value, type}` triples into a validated,
/// coerced JSON payload against `schema`. Unknown field names are dropped.
pub fn field_values_to_payload(
    schema: &Schema,
    values: &[FieldValue],
) -> serde_json::Map<String, Value> {
    let mut raw = serde_json::Map::new();
    for fv in values {
        let Some(field) = schema.field(&fv.field) else { continue };
        let value = match field.ty {
            FieldType::Object | FieldType::Array => {
                serde_json::from_str(&fv.value).unwrap_or_else(|_| Value::String(fv.value.clone()))
            }
            _ => Value::String(fv.value.clone()),
        };
        raw.insert(fv.field.clone(), value);
    }
    raw
}

/// A persisted structured row, already projected: `user_id` is never present
/// (never present in returned payloads after projection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}
