//! Typed schema declarations: the single source of truth for DDL, prompt
//! field listings, and row validation.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldIssue, Result, StructuredError};

/// Declared type of a schema field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    /// Free text.
    String,
    /// Numeric value; persisted as `REAL`.
    Number,
    /// Persisted as 0/1.
    Boolean,
    /// ISO-8601 date string; persisted as `TEXT` (monotone lexicographic order).
    DateAsIsoString,
    /// One of a closed set of strings.
    Enum {
        /// Allowed values.
        variants: Vec<String>,
    },
    /// Arbitrary nested value, persisted as `JSON.stringify`'d text.
    Object,
    /// Arbitrary nested list, persisted as `JSON.stringify`'d text.
    Array,
}

impl FieldType {
    /// The SQL column affinity used to materialise this field.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Number => "REAL",
            Self::Boolean => "INTEGER",
            Self::String | Self::DateAsIsoString | Self::Enum { .. } | Self::Object | Self::Array => "TEXT",
        }
    }
}

/// A single field in a [`Schema`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldDef {
    /// Field name, sanitised to `[a-z0-9_]+` before becoming a column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: FieldType,
    /// Whether the field must be present on insert.
    #[serde(default)]
    pub required: bool,
    /// Human-readable description surfaced to the LLM prompts.
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldDef {
    /// Convenience constructor for a required field.
    #[must_use]
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty, required: true, description: None }
    }

    /// Convenience constructor for an optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self { name: name.into(), ty, required: false, description: None }
    }

    /// Attaches a description, shown to the LLM.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A named, typed record shape. Materialises exactly one table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    /// Schema name; also the basis of the table name after sanitisation.
    pub name: String,
    /// Human description, shown to the intent/query LLM prompts.
    pub description: String,
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldDef>,
}

impl Schema {
    /// Creates a schema with no fields yet.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), fields: Vec::new() }
    }

    /// Appends a field declaration.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Sanitised table name: lowercase, `[a-z0-9_]+` only.
    #[must_use]
    pub fn table_name(&self) -> String {
        sanitize_identifier(&self.name)
    }

    /// Finds a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates and coerces a raw JSON payload against this schema.
    ///
    /// When `partial` is `true` (updates), missing required fields are
    /// allowed; only fields present in `raw` are validated/coerced.
    /// Keys not declared on the schema are silently dropped, since the
    /// extraction envelope already restricts the model to declared names.
    pub fn validate(&self, raw: &serde_json::Map<String, Value>, partial: bool) -> Result<serde_json::Map<String, Value>> {
        let mut issues = Vec::new();
        let mut out = serde_json::Map::new();

        for field in &self.fields {
            match raw.get(&field.name) {
                Some(value) => match coerce_value(&field.ty, value) {
                    Ok(coerced) => {
                        out.insert(field.name.clone(), coerced);
                    }
                    Err(message) => issues.push(FieldIssue { field: field.name.clone(), message }),
                },
                None => {
                    if field.required && !partial {
                        issues.push(FieldIssue {
                            field: field.name.clone(),
                            message: "required field missing".to_string(),
                        });
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(out)
        } else {
            Err(StructuredError::SchemaValidation(issues))
        }
    }
}

/// Coerces a loosely-typed JSON value into the shape its declared field type expects.
///
/// Mirrors the coercion rules the intent processor's post-processing step
/// applies: numbers strip `$` and `,` before parsing; booleans parse
/// case-insensitive `true`/`yes`/`1`.
pub fn coerce_value(ty: &FieldType, value: &Value) -> core::result::Result<Value, String> {
    match ty {
        FieldType::String | FieldType::DateAsIsoString => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            other => Ok(Value::String(other.to_string())),
        },
        FieldType::Enum { variants } => match value.as_str() {
            Some(s) if variants.iter().any(|v| v == s) => Ok(Value::String(s.to_string())),
            Some(s) => Err(format!("{s} is not one of {variants:?}")),
            None => Err("expected a string enum value".to_string()),
        },
        FieldType::Number => {
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => {
                    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
                    cleaned.trim().parse::<f64>().ok()
                }
                _ => None,
            };
            parsed
                .map(|n| Value::Number(serde_json::Number::from_f64(n).unwrap_or_else(|| 0.into())))
                .ok_or_else(|| format!("{value} is not a number"))
        }
        FieldType::Boolean => {
            let parsed = match value {
                Value::Bool(b) => Some(*b),
                Value::String(s) => {
                    let lower = s.to_lowercase();
                    match lower.as_str() {
                        "true" | "yes" | "1" => Some(true),
                        "false" | "no" | "0" => Some(false),
                        _ => None,
                    }
                }
                Value::Number(n) => n.as_i64().map(|i| i != 0),
                _ => None,
            };
            parsed.map(Value::Bool).ok_or_else(|| format!("{value} is not a boolean"))
        }
        FieldType::Object | FieldType::Array => Ok(value.clone()),
    }
}

/// Lowercases and strips anything outside `[a-z0-9_]` before interpolating a
/// name into SQL ("Neither relies on parsing the SQL").
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// A name-keyed set of declared schemas, the shared source of truth handed
/// to the intent processor, query generator, structured client, and agent.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Schema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any previous one with the same name.
    pub fn register(&mut self, schema: Schema) {
        self.schemas.insert(schema.name.clone(), schema);
    }

    /// Looks up a schema by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Returns all registered schemas.
    pub fn all(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Returns all registered schema names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payments_schema() -> Schema {
        Schema::new("payments", "Money paid to someone")
            .with_field(FieldDef::required("recipient", FieldType::String))
            .with_field(FieldDef::required("amount", FieldType::Number))
            .with_field(FieldDef::optional("description", FieldType::String))
    }

    #[test]
    fn sanitizes_table_names() {
        let schema = Schema::new("My Payments!", "desc");
        assert_eq!(schema.table_name(), "my_payments_");
    }

    #[test]
    fn coerces_dollar_amounts() {
        let schema = payments_schema();
        let mut raw = serde_json::Map::new();
        raw.insert("recipient".into(), Value::String("Jayden".into()));
        raw.insert("amount".into(), Value::String("$150".into()));
        let validated = schema.validate(&raw, false).unwrap();
        assert_eq!(validated["amount"], serde_json::json!(150.0));
    }

    #[test]
    fn rejects_missing_required_field_on_insert() {
        let schema = payments_schema();
        let mut raw = serde_json::Map::new();
        raw.insert("recipient".into(), Value::String("Jayden".into()));
        let result = schema.validate(&raw, false);
        assert!(matches!(result, Err(StructuredError::SchemaValidation(_))));
    }

    #[test]
    fn allows_missing_required_field_on_partial_update() {
        let schema = payments_schema();
        let mut raw = serde_json::Map::new();
        raw.insert("amount".into(), Value::String("200".into()));
        let validated = schema.validate(&raw, true).unwrap();
        assert_eq!(validated["amount"], serde_json::json!(200.0));
    }
}
