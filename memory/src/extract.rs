//! Fact extraction and consolidation: two structured LLM round-trips.

use recall_core::{
    LanguageModel,
    llm::oneshot,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const EXTRACTION_SYSTEM: &str = "You extract meaningful, persistent facts from conversation text. \
    Rules: one atomic fact per item; phrase every fact in the third person (\"the user ...\"); \
    the user's name, if stated, is high priority and must be captured; skip greetings, small talk, \
    and anything with no lasting informational value. If nothing qualifies, return an empty list.";

const CONSOLIDATION_SYSTEM: &str = "You maintain a memory database. Given a new candidate fact and \
    up to five existing memories (identified by small ordinal numbers, not real ids), choose exactly \
    one action:\n\
    ADD — the candidate is genuinely new information unrelated to the listed memories. Requires `content`.\n\
    UPDATE — the candidate enriches or corrects exactly one listed memory. Requires `id` (the ordinal \
    of that memory) and the merged `content`.\n\
    DELETE — the candidate contradicts or invalidates exactly one listed memory. Requires only `id`.\n\
    NONE — the candidate duplicates a listed memory with no new information.\n\
    Example: candidate \"User's name is John Doe\", memory 0 = \"User's name is John\" -> \
    {\"action\":\"UPDATE\",\"id\":\"0\",\"content\":\"User's name is John Doe\"}.\n\
    Example: candidate \"User no longer works at Google\", memory 0 = \"User works at Google\" -> \
    {\"action\":\"DELETE\",\"id\":\"0\"}.";

/// A single atomic fact as emitted by the extraction call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFact {
    /// Third-person atomic fact.
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
struct ExtractionBatch {
    facts: Vec<ExtractedFact>,
}

/// Extracts atomic facts from `text`. Returns an empty vector if the model
/// produces nothing usable — this is not an error condition.
pub(crate) async fn extract_facts<LLM: LanguageModel>(llm: &LLM, text: &str) -> Vec<ExtractedFact> {
    let request = oneshot(EXTRACTION_SYSTEM, text);
    llm.generate::<ExtractionBatch>(request)
        .await
        .map(|batch| batch.facts)
        .unwrap_or_default()
}

/// One of the neighbours shown to the consolidation call, addressed by its
/// ordinal position rather than its real identifier.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NeighbourRef<'a> {
    pub id: String,
    pub content: &'a str,
}

/// Action selected by the consolidation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsolidationAction {
    /// Insert the candidate as a new memory.
    Add,
    /// Merge the candidate into one existing memory.
    Update,
    /// Remove one existing memory the candidate invalidates.
    Delete,
    /// Skip: the candidate carries nothing new.
    None,
}

/// Raw decision returned by the consolidation call, before ordinal substitution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidationDecision {
    /// Chosen action.
    pub action: ConsolidationAction,
    /// Ordinal position (as a string) of the targeted neighbour, for UPDATE/DELETE.
    #[serde(default)]
    pub id: Option<String>,
    /// Merged content, for ADD/UPDATE.
    #[serde(default)]
    pub content: Option<String>,
}

impl ConsolidationDecision {
    fn add(content: &str) -> Self {
        Self {
            action: ConsolidationAction::Add,
            id: None,
            content: Some(content.to_string()),
        }
    }
}

/// Classifies `candidate` against `neighbours`. If `neighbours` is empty the
/// call is skipped entirely and ADD is returned locally. A missing or
/// malformed model response also degrades to ADD with the raw fact — never
/// an error.
pub(crate) async fn consolidate<LLM: LanguageModel>(
    llm: &LLM,
    candidate: &str,
    neighbours: &[NeighbourRef<'_>],
) -> ConsolidationDecision {
    if neighbours.is_empty() {
        return ConsolidationDecision::add(candidate);
    }

    let neighbours_json = serde_json::to_string_pretty(neighbours).unwrap_or_default();
    let prompt = format!(
        "Candidate fact:\n{candidate}\n\nExisting memories (ordinal -> content):\n{neighbours_json}\n\n\
         Return the JSON decision."
    );
    let request = oneshot(CONSOLIDATION_SYSTEM, prompt);
    llm.generate::<ConsolidationDecision>(request)
        .await
        .unwrap_or_else(|_| ConsolidationDecision::add(candidate))
}
