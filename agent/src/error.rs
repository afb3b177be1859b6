//! Error type for the tool-using agent.

use thiserror::Error;

/// Errors surfaced by [`crate::AgentClient::run`].
///
/// Individual tool failures never reach this type: a failed tool call is
/// folded into the `{success:false, error}` envelope returned to the model
/// so it can retry with corrected arguments. This variant is reserved
/// for failures in the loop itself.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The underlying language model failed to respond.
    #[error("language model error: {0}")]
    Model(#[from] anyhow::Error),
}

/// Result alias for the agent crate.
pub type Result<T> = core::result::Result<T, AgentError>;
