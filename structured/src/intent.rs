//! Intent classification: one structured LLM call returning the
//! extraction envelope, plus the server-side post-processing
//! invariants (schema-name validation, field coercion).

use recall_core::{LanguageModel, llm::oneshot};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{record::FieldValue, schema::SchemaRegistry};

const INTENT_SYSTEM: &str = "You classify a user utterance against a set of declared record \
    schemas. Rules:\n\
    INSERT — the utterance describes a concrete past or present event the user performed; extract \
    every field the schema declares that the utterance supplies.\n\
    QUERY — the utterance is an interrogative about previously stored data; echo the user's question \
    verbatim in `query`.\n\
    UPDATE — the utterance corrects a prior entry (cues: \"actually\", \"not X but Y\", \"change\"); \
    return matchCriteria identifying the row plus updateData with only the corrected fields.\n\
    DELETE — the utterance asks to remove an entry (cues: \"delete\", \"remove\", \"cancel\", \
    \"forget\"); return matchCriteria only.\n\
    NONE — intentions, opinions, third-person statements, or anything not matching a declared schema.\n\
    When a monetary transaction also mentions a fitness activity, prefer the payments schema; a \
    workout description that names a person but no payment amount is a workout, not a payment.\n\
    Set matched=false and schema=null whenever no declared schema applies.";

/// One of the four recency qualifiers a structured UPDATE/DELETE's
/// `matchCriteria` may carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Recency {
    MostRecent,
    Today,
    ThisWeek,
    #[default]
    Any,
}

/// Criteria used to locate the row a structured UPDATE/DELETE targets,
/// without round-tripping SQL through the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchCriteria {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub recency: Recency,
}

/// One of insert/query/update/delete/none, assigned to a structured-memory utterance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Insert,
    Query,
    Update,
    Delete,
    None,
}

/// The raw envelope the intent LLM call returns.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionEnvelope {
    pub matched: bool,
    #[serde(default)]
    pub schema: Option<String>,
    pub confidence: f32,
    pub reason: String,
    pub intent: Intent,
    #[serde(default)]
    pub data: Vec<FieldValue>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(rename = "matchCriteria", default)]
    pub match_criteria: Option<MatchCriteria>,
    #[serde(rename = "updateData", default)]
    pub update_data: Vec<FieldValue>,
}

impl ExtractionEnvelope {
    fn not_matched(reason: impl Into<String>) -> Self {
        Self {
            matched: false,
            schema: None,
            confidence: 0.0,
            reason: reason.into(),
            intent: Intent::None,
            data: Vec::new(),
            query: None,
            match_criteria: None,
            update_data: Vec::new(),
        }
    }
}

/// Runs the intent classification call and enforces the post-processing
/// invariants: a `schema` name that isn't registered demotes the
/// result to not-matched rather than surfacing an error.
pub struct IntentProcessor<'a> {
    schemas: &'a SchemaRegistry,
}

impl<'a> IntentProcessor<'a> {
    #[must_use]
    pub const fn new(schemas: &'a SchemaRegistry) -> Self {
        Self { schemas }
    }

    /// Classifies `text` against the registered schemas. `today` is
    /// substituted into the prompt so relative-date reasoning ("today",
    /// "this week") is anchored to the caller's clock rather than the
    /// model's.
    pub async fn classify<LLM: LanguageModel>(&self, llm: &LLM, text: &str, today: &str) -> ExtractionEnvelope {
        let schema_listing = self
            .schemas
            .all()
            .map(describe_schema)
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!("Today's date is {today}.\n\nDeclared schemas:\n{schema_listing}\n\nUtterance:\n{text}");
        let request = oneshot(INTENT_SYSTEM, prompt);

        let Ok(mut envelope) = llm.generate::<ExtractionEnvelope>(request).await else {
            return ExtractionEnvelope::not_matched("intent classification call failed");
        };

        if envelope.matched {
            let Some(schema_name) = envelope.schema.as_deref() else {
                return ExtractionEnvelope::not_matched("matched=true but no schema named");
            };
            let Some(schema) = self.schemas.get(schema_name) else {
                return ExtractionEnvelope::not_matched(format!("unknown schema: {schema_name}"));
            };
            for fv in envelope.data.iter_mut().chain(envelope.update_data.iter_mut()) {
                if let Some(field) = schema.field(&fv.field) {
                    fv.ty = field.ty.clone().into();
                }
            }
        }

        envelope
    }
}

fn describe_schema(schema: &crate::schema::Schema) -> String {
    let fields = schema
        .fields
        .iter()
        .map(|f| {
            let required = if f.required { "required" } else { "optional" };
            format!("  - {} ({required}, {:?}){}", f.name, f.ty, f.description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{} — {}\n{fields}", schema.name, schema.description)
}

impl From<crate::schema::FieldType> for crate::record::FieldValueType {
    fn from(ty: crate::schema::FieldType) -> Self {
        use crate::schema::FieldType as Ty;
        match ty {
            Ty::String => Self::String,
            Ty::Number => Self::Number,
            Ty::Boolean => Self::Boolean,
            Ty::DateAsIsoString => Self::DateAsIsoString,
            Ty::Enum { .. } => Self::Enum,
            Ty::Object => Self::Object,
            Ty::Array => Self::Array,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType, Schema};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.register(
            Schema::new("payments", "Money paid to someone")
                .with_field(FieldDef::required("recipient", FieldType::String))
                .with_field(FieldDef::required("amount", FieldType::Number)),
        );
        registry
    }

    #[test]
    fn unknown_schema_demotes_to_not_matched() {
        let registry = registry();
        let processor = IntentProcessor::new(&registry);
        assert!(registry.get("nonexistent").is_none());
        // Exercised end-to-end in the client tests via a scripted LLM.
        let _ = processor;
    }
}
