//! Natural-language question to safe, tenant-scoped `SELECT`.

use recall_core::{LanguageModel, llm::oneshot};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaRegistry;

const QUERY_SYSTEM: &str = "You translate a natural-language question about stored records into a \
    single read-only SQL SELECT statement. Rules: only SELECT is permitted, never anything else; \
    the statement MUST filter on `WHERE user_id = '<tenant>'`; use LIKE for fuzzy text matching and \
    aggregate functions (SUM, COUNT, AVG, MIN, MAX) when the question asks for a total, count, or \
    extreme value. If the question cannot be answered from the declared schemas, set canAnswer to \
    false and explain why instead of guessing at SQL.";

/// `{canAnswer, sql, explanation}` as produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryEnvelope {
    #[serde(rename = "canAnswer")]
    pub can_answer: bool,
    #[serde(default)]
    pub sql: Option<String>,
    pub explanation: String,
}

/// Produces tenant-scoped `SELECT` statements from natural-language questions.
pub struct QueryGenerator<'a> {
    schemas: &'a SchemaRegistry,
}

impl<'a> QueryGenerator<'a> {
    #[must_use]
    pub const fn new(schemas: &'a SchemaRegistry) -> Self {
        Self { schemas }
    }

    /// Asks the model for SQL answering `question`, then deterministically
    /// enforces the tenant clause server-side regardless of what the model
    /// produced.
    pub async fn generate<LLM: LanguageModel>(&self, llm: &LLM, question: &str, tenant: &str) -> QueryEnvelope {
        let schema_listing = self.schemas.names().join(", ");
        let prompt = format!(
            "Tenant id: {tenant}\nDeclared schemas (table names): {schema_listing}\n\nQuestion:\n{question}"
        );
        let request = oneshot(QUERY_SYSTEM, prompt);

        let Ok(mut envelope) = llm.generate::<QueryEnvelope>(request).await else {
            return QueryEnvelope {
                can_answer: false,
                sql: None,
                explanation: "query generation call failed".to_string(),
            };
        };

        if envelope.can_answer {
            envelope.sql = envelope.sql.map(|sql| enforce_tenant_clause(&sql, tenant));
        }
        envelope
    }
}

/// Rewrites `sql` to guarantee a `user_id = '<tenant>'` filter if the model
/// omitted one. Pure string surgery, no SQL parsing.
#[must_use]
pub fn enforce_tenant_clause(sql: &str, tenant: &str) -> String {
    let escaped = tenant.replace('\'', "''");
    if sql.to_lowercase().contains("user_id") {
        return sql.to_string();
    }

    let clause = format!("user_id = '{escaped}'");
    let upper = sql.to_uppercase();

    if let Some(where_pos) = upper.find(" WHERE ") {
        let insert_at = where_pos + 7;
        return format!("{}{} AND {}", &sql[..insert_at], clause, &sql[insert_at..]);
    }

    for keyword in [" GROUP BY ", " ORDER BY ", " LIMIT "] {
        if let Some(pos) = upper.find(keyword) {
            return format!("{} WHERE {}{}", &sql[..pos], clause, &sql[pos..]);
        }
    }

    format!("{} WHERE {}", sql.trim_end_matches(';').trim_end(), clause)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_missing_where_clause() {
        let sql = "SELECT SUM(amount) FROM payments";
        let rewritten = enforce_tenant_clause(sql, "alice");
        assert_eq!(rewritten, "SELECT SUM(amount) FROM payments WHERE user_id = 'alice'");
    }

    #[test]
    fn extends_existing_where_clause() {
        let sql = "SELECT * FROM payments WHERE recipient LIKE '%Jayden%'";
        let rewritten = enforce_tenant_clause(sql, "alice");
        assert_eq!(rewritten, "SELECT * FROM payments WHERE user_id = 'alice' AND recipient LIKE '%Jayden%'");
    }

    #[test]
    fn inserts_before_group_by() {
        let sql = "SELECT recipient, SUM(amount) FROM payments GROUP BY recipient";
        let rewritten = enforce_tenant_clause(sql, "alice");
        assert_eq!(rewritten, "SELECT recipient, SUM(amount) FROM payments WHERE user_id = 'alice' GROUP BY recipient");
    }

    #[test]
    fn leaves_existing_user_id_clause_untouched() {
        let sql = "SELECT * FROM payments WHERE user_id = 'alice'";
        assert_eq!(enforce_tenant_clause(sql, "alice"), sql);
    }
}
