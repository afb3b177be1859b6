//! Model metadata and sampling parameters.

use alloc::string::String;

/// Sampling parameters for a single [`super::LLMRequest`].
///
/// Providers are free to ignore fields they don't support; `structured_outputs`
/// is set automatically by [`super::structured_generate`] when a caller asks
/// for a schema-constrained [`super::LanguageModel::generate`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parameters {
    /// Sampling temperature, provider-scaled (typically `0.0..=2.0`).
    pub temperature: Option<f32>,
    /// Whether the provider should emit reasoning/thinking traces as
    /// [`super::Event::Reasoning`].
    pub include_reasoning: bool,
    /// Whether the request must be decoded against a JSON schema.
    ///
    /// Set by [`super::structured_generate`]; providers that support
    /// native structured decoding should branch on this flag instead of
    /// relying purely on the injected system prompt.
    pub structured_outputs: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            temperature: None,
            include_reasoning: false,
            structured_outputs: false,
        }
    }
}

impl Parameters {
    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, value: f32) -> Self {
        self.temperature = Some(value);
        self
    }

    /// Requests reasoning traces, if the provider supports them.
    #[must_use]
    pub const fn include_reasoning(mut self, value: bool) -> Self {
        self.include_reasoning = value;
        self
    }
}

/// Metadata describing a concrete model instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Model identifier as accepted by the provider's API.
    pub id: String,
    /// Human-readable vendor name.
    pub vendor: String,
    /// Display name.
    pub display_name: String,
    /// One-line description.
    pub description: String,
    /// Context window size, in tokens.
    pub context_window: usize,
}

impl Profile {
    /// Creates a new model profile.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        vendor: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        context_window: usize,
    ) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            display_name: display_name.into(),
            description: description.into(),
            context_window,
        }
    }
}
