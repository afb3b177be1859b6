use crate::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIM, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL,
    DEEPSEEK_BASE_URL, OPENROUTER_BASE_URL,
    error::OpenAIError,
    request::ChatCompletionRequest,
    response::ChatCompletionResponse,
};
use recall_core::llm::{Event, LLMRequest, LanguageModel, model::Profile as ModelProfile};
use futures_core::Stream;
use futures_lite::StreamExt;
use std::{future::Future, sync::Arc};

/// `OpenAI`-compatible chat model backed by the Chat Completions API.
///
/// Works against `OpenAI` itself as well as Deepseek, `OpenRouter`, or any
/// other endpoint that mirrors the `chat/completions` wire format.
#[derive(Clone, Debug)]
pub struct OpenAI {
    inner: Arc<Config>,
}

impl OpenAI {
    /// Create a new client using the provided API key and default model.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).build()
    }

    /// Create a client configured for [`Deepseek`](https://api-docs.deepseek.com)'s OpenAI-compatible endpoint.
    #[must_use]
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).base_url(DEEPSEEK_BASE_URL).build()
    }

    /// Create a client configured for [`OpenRouter`](https://openrouter.ai)'s OpenAI-compatible endpoint.
    #[must_use]
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).base_url(OPENROUTER_BASE_URL).build()
    }

    /// Start building an [`OpenAI`] client with custom configuration.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> Builder {
        Builder::new(api_key)
    }

    /// Override the default chat model in-place.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).chat_model = model.into();
        self
    }

    /// Override the REST base URL (useful for OpenAI-compatible endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).base_url = base_url.into();
        self
    }

    /// Override the embeddings model identifier.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        let cfg = Arc::make_mut(&mut self.inner);
        if let Some(dim) = infer_embedding_dim(&model) {
            cfg.embedding_dimensions = dim;
        }
        cfg.embedding_model = model;
        self
    }

    /// Override the embedding dimension (defaults depend on model).
    #[must_use]
    pub fn with_embedding_dimensions(mut self, dimensions: usize) -> Self {
        Arc::make_mut(&mut self.inner).embedding_dimensions = dimensions;
        self
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        self.inner.clone()
    }

    async fn chat(&self, request: LLMRequest) -> Result<Event, OpenAIError> {
        let cfg = self.inner.clone();
        let (messages, parameters, tool_definitions) = request.into_parts();

        let body = ChatCompletionRequest::new(
            cfg.chat_model.clone(),
            &messages,
            &parameters,
            &tool_definitions,
        );

        let response = cfg
            .http
            .post(cfg.request_url("/chat/completions"))
            .bearer_auth(&cfg.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), text));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let Some(message) = parsed.into_primary() else {
            return Err(OpenAIError::Api(
                "chat completion response had no choices".into(),
            ));
        };

        let (content, mut tool_calls) = message.into_parts();
        if let Some(call) = tool_calls.pop() {
            return Ok(Event::ToolCall(call));
        }
        Ok(Event::Text(content.unwrap_or_default()))
    }
}

impl LanguageModel for OpenAI {
    type Error = OpenAIError;

    fn respond(&self, request: LLMRequest) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        let model = self.clone();
        let init_future = async move { model.chat(request).await };
        futures_lite::stream::iter([init_future]).then(|fut| fut)
    }

    fn profile(&self) -> impl Future<Output = ModelProfile> + Send {
        let cfg = self.inner.clone();
        async move {
            ModelProfile::new(
                cfg.chat_model.clone(),
                "OpenAI",
                cfg.chat_model.clone(),
                "OpenAI GPT family model",
                128_000,
            )
        }
    }
}

fn classify_error(status: u16, body: String) -> OpenAIError {
    match status {
        429 => OpenAIError::RateLimit {
            message: body,
            retry_after: None,
        },
        500..=599 => OpenAIError::ServerError {
            status,
            message: body,
        },
        408 => OpenAIError::Timeout,
        _ => OpenAIError::Api(format!("HTTP {status}: {body}")),
    }
}

/// Builder for [`OpenAI`] clients.
#[derive(Debug)]
pub struct Builder {
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    embedding_dimensions: usize,
}

impl Builder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIM,
        }
    }

    /// Set a custom API base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Select a model identifier (e.g., `gpt-5-nano`).
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Select the embeddings model identifier.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if let Some(dim) = infer_embedding_dim(&model) {
            self.embedding_dimensions = dim;
        }
        self.embedding_model = model;
        self
    }

    /// Override the embedding vector dimension.
    #[must_use]
    pub const fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.embedding_dimensions = dimensions;
        self
    }

    /// Consume the builder and create an [`OpenAI`] client.
    #[must_use]
    pub fn build(self) -> OpenAI {
        OpenAI {
            inner: Arc::new(Config {
                http: reqwest::Client::new(),
                api_key: self.api_key,
                base_url: self.base_url,
                chat_model: self.chat_model,
                embedding_model: self.embedding_model,
                embedding_dimensions: self.embedding_dimensions,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) http: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) chat_model: String,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dimensions: usize,
}

impl Config {
    pub(crate) fn request_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn infer_embedding_dim(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}
