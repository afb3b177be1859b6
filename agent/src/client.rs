//! The bounded tool-calling loop.
//!
//! Drives [`LanguageModel::respond`] directly rather than the legacy
//! `respond_with_tools` path: tool calls are observed as [`Event::ToolCall`]s,
//! executed against a per-run [`Tools`] registry, and fed back as
//! [`Message::tool`] results until the model stops calling tools or
//! `max_steps` is reached.

use std::sync::Arc;

use async_lock::Mutex;
use futures_lite::{StreamExt, pin};
use recall_core::llm::{
    Event, LLMRequest, LanguageModel, Message, ToolCall,
    tool::Tools,
};
use recall_structured::schema::SchemaRegistry;
use recall_structured::store::StructuredStore;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::tools::{
    DeleteRecordTool, GetRecordTool, InsertRecordTool, ListRecordsTool, ListSchemasTool,
    OrdinalTable, SearchRecordsTool, ToolContext, UpdateRecordTool,
};

const DEFAULT_MAX_STEPS: usize = 10;

const SYSTEM_PROMPT: &str = "You manage a user's structured records through tools. \
Ids you see in tool results are opaque handles valid only for this conversation; \
always obtain an id from listRecords or searchRecords before passing it to getRecord, \
updateRecord, or deleteRecord. Never invent an id. Call listSchemas first if you are \
unsure which schema or fields apply. Stop calling tools once the request is satisfied \
and reply with a short confirmation.";

/// A single tool call the agent made during a [`AgentClient::run`], and the
/// envelope it received back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentToolCall {
    /// Tool name, e.g. `updateRecord`.
    pub name: String,
    /// Arguments the model supplied.
    pub arguments: Value,
    /// The `{success, data?, error?}` envelope returned to the model.
    pub result: String,
}

/// Outcome of one bounded agent run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    /// The model's final, non-tool-call text.
    pub text: String,
    /// Number of tool-calling round trips performed.
    pub steps: usize,
    /// Every tool call made, in order.
    pub tool_calls: Vec<AgentToolCall>,
    /// True iff any `insertRecord`/`updateRecord`/`deleteRecord` call succeeded.
    pub data_modified: bool,
}

/// Drives a bounded tool-calling loop over a [`StructuredStore`] for
/// multi-hop UPDATE/DELETE that a single intent-classification pass can't
/// resolve on its own.
pub struct AgentClient<LLM, STORE> {
    llm: LLM,
    store: Arc<STORE>,
    schemas: Arc<SchemaRegistry>,
    max_steps: usize,
}

impl<LLM, STORE> AgentClient<LLM, STORE>
where
    LLM: LanguageModel,
    STORE: StructuredStore + 'static,
{
    /// Builds an agent over the given model, store, and schema registry.
    pub fn new(llm: LLM, store: STORE, schemas: SchemaRegistry) -> Self {
        Self {
            llm,
            store: Arc::new(store),
            schemas: Arc::new(schemas),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Overrides the default bound of 10 tool-calling steps.
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn build_tools(&self, tenant: &str) -> Tools {
        let ctx = ToolContext {
            store: self.store.clone(),
            schemas: self.schemas.clone(),
            tenant: tenant.to_string(),
            ordinals: Arc::new(Mutex::new(OrdinalTable::default())),
        };
        let mut tools = Tools::new();
        tools.register(ListSchemasTool { ctx: ctx.clone() });
        tools.register(ListRecordsTool { ctx: ctx.clone() });
        tools.register(GetRecordTool { ctx: ctx.clone() });
        tools.register(SearchRecordsTool { ctx: ctx.clone() });
        tools.register(InsertRecordTool { ctx: ctx.clone() });
        tools.register(UpdateRecordTool { ctx: ctx.clone() });
        tools.register(DeleteRecordTool { ctx });
        tools
    }

    /// Runs the bounded tool-calling loop for `tenant`.
    ///
    /// `instruction` is the fully-formed prompt; when invoked after the
    /// structured client has already classified an UPDATE/DELETE intent, the
    /// caller should embed the schema name, intent, and any pre-extracted
    /// fields so the agent can skip re-extraction and go straight to the
    /// search-then-mutate hop.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Model`] if the language model itself fails.
    /// Tool failures never surface here: they become `{success:false,...}`
    /// envelopes fed back to the model.
    pub async fn run(&self, instruction: &str, tenant: &str) -> Result<AgentOutcome> {
        let mut tools = self.build_tools(tenant);
        let mut messages = vec![Message::system(SYSTEM_PROMPT), Message::user(instruction)];
        let mut tool_calls_log = Vec::new();
        let mut data_modified = false;
        let mut steps = 0;
        let mut text = String::new();

        while steps < self.max_steps {
            let request = LLMRequest::new(messages.clone()).with_tool_definitions(tools.definitions());
            let stream = self.llm.respond(request);
            let (chunk, calls) = collect_events(stream)
                .await
                .map_err(|e| AgentError::Model(anyhow::Error::new(e)))?;
            text = chunk;

            if calls.is_empty() {
                break;
            }
            steps += 1;
            messages.push(Message::assistant_with_tool_calls(text.clone(), calls.clone()));

            for call in calls {
                let result = match tools.call(&call.name, call.arguments_json()).await {
                    Ok(envelope) => envelope,
                    Err(e) => format!(r#"{{"success":false,"error":{}}}"#, serde_json::to_string(&e.to_string()).unwrap_or_default()),
                };

                if matches!(call.name.as_str(), "insertRecord" | "updateRecord" | "deleteRecord") && envelope_succeeded(&result) {
                    data_modified = true;
                }

                messages.push(Message::tool(call.id.clone(), result.clone()));
                tool_calls_log.push(AgentToolCall { name: call.name.clone(), arguments: call.arguments.clone(), result });
            }
        }

        Ok(AgentOutcome { text, steps, tool_calls: tool_calls_log, data_modified })
    }
}

fn envelope_succeeded(envelope: &str) -> bool {
    serde_json::from_str::<Value>(envelope)
        .ok()
        .and_then(|v| v.get("success").and_then(Value::as_bool))
        .unwrap_or(false)
}

async fn collect_events<S, E>(stream: S) -> core::result::Result<(String, Vec<ToolCall>), E>
where
    S: futures_core::Stream<Item = core::result::Result<Event, E>>,
{
    pin!(stream);
    let mut text = String::new();
    let mut calls = Vec::new();
    while let Some(event) = stream.next().await {
        match event? {
            Event::Text(chunk) => text.push_str(&chunk),
            Event::ToolCall(call) => calls.push(call),
            Event::Reasoning(_) | Event::BuiltInToolResult { .. } => {}
        }
    }
    Ok((text, calls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future as StdFuture;
    use futures_core::Stream;
    use recall_core::llm::model::Profile;
    use recall_structured::schema::{FieldDef, FieldType, Schema};
    use recall_structured::store::InMemoryStructuredStore;
    use schemars::JsonSchema;
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedLlm {
        turns: StdMutex<VecDeque<Vec<Event>>>,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<Vec<Event>>) -> Self {
            Self { turns: StdMutex::new(turns.into()) }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("scripted llm exhausted")]
    struct ScriptedLlmError;

    impl LanguageModel for ScriptedLlm {
        type Error = ScriptedLlmError;

        fn respond(&self, _request: LLMRequest) -> impl Stream<Item = core::result::Result<Event, Self::Error>> + Send {
            let events = self.turns.lock().unwrap().pop_front().unwrap_or_default();
            futures_lite::stream::iter(events.into_iter().map(Ok))
        }

        fn generate<T: JsonSchema + DeserializeOwned + 'static>(
            &self,
            _request: LLMRequest,
        ) -> impl StdFuture<Output = recall_core::Result<T>> + Send {
            async { Err(recall_core::Error::msg("not used by the agent loop")) }
        }

        fn profile(&self) -> impl StdFuture<Output = Profile> + Send {
            async { Profile::new("scripted", "test", "scripted", "test double", 4096) }
        }
    }

    fn payments_schema() -> Schema {
        Schema::new("payments", "Money paid to someone")
            .with_field(FieldDef::required("recipient", FieldType::String))
            .with_field(FieldDef::required("amount", FieldType::Number))
    }

    fn payload(recipient: &str, amount: f64) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("recipient".to_string(), json!(recipient));
        map.insert("amount".to_string(), json!(amount));
        map
    }

    async fn schemas_with_payments(store: &InMemoryStructuredStore) -> SchemaRegistry {
        let schema = payments_schema();
        store.materialize(&schema).await.unwrap();
        let mut schemas = SchemaRegistry::new();
        schemas.register(schema);
        schemas
    }

    #[tokio::test]
    async fn multi_hop_search_then_delete() {
        let store = InMemoryStructuredStore::new();
        let schemas = schemas_with_payments(&store).await;
        store.insert(&payments_schema(), "alice", payload("Jayden", 150.0)).await.unwrap();

        let llm = ScriptedLlm::new(vec![
            vec![Event::tool_call(
                "1",
                "searchRecords",
                json!({"schema": "payments", "field": "recipient", "value": "Jayden"}),
            )],
            vec![Event::tool_call("2", "deleteRecord", json!({"schema": "payments", "id": "0"}))],
            vec![Event::Text("Deleted the payment to Jayden.".to_string())],
        ]);

        let agent = AgentClient::new(llm, store, schemas);
        let outcome = agent.run("Delete the payment to Jayden", "alice").await.unwrap();

        assert_eq!(outcome.steps, 2);
        assert!(outcome.data_modified);
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(outcome.text, "Deleted the payment to Jayden.");
        assert!(outcome.tool_calls[1].result.contains(r#""success":true"#));
    }

    #[tokio::test]
    async fn unknown_id_is_reported_back_to_the_model_instead_of_erroring() {
        let store = InMemoryStructuredStore::new();
        let schemas = schemas_with_payments(&store).await;

        let llm = ScriptedLlm::new(vec![
            vec![Event::tool_call("1", "getRecord", json!({"schema": "payments", "id": "7"}))],
            vec![Event::Text("I couldn't find that record.".to_string())],
        ]);

        let agent = AgentClient::new(llm, store, schemas);
        let outcome = agent.run("What was that payment again?", "alice").await.unwrap();

        assert!(!outcome.data_modified);
        assert!(outcome.tool_calls[0].result.contains("unknown id"));
    }

    #[tokio::test]
    async fn agent_bound_caps_tool_calls_at_max_steps() {
        let store = InMemoryStructuredStore::new();
        let schemas = schemas_with_payments(&store).await;

        // The model keeps calling tools forever; the loop must still stop.
        let turns = (0..20)
            .map(|i| vec![Event::tool_call(i.to_string(), "listSchemas", json!({}))])
            .collect();
        let llm = ScriptedLlm::new(turns);

        let agent = AgentClient::new(llm, store, schemas).with_max_steps(3);
        let outcome = agent.run("List everything, forever", "alice").await.unwrap();

        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.tool_calls.len(), 3);
    }
}
