use crate::{client::OpenAI, error::OpenAIError, response::EmbeddingResponse};
use recall_core::EmbeddingModel;
use serde::Serialize;

/// Maximum number of inputs `OpenAI` accepts in a single `/embeddings` call.
const MAX_BATCH: usize = 96;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

impl EmbeddingModel for OpenAI {
    fn dim(&self) -> usize {
        self.config().embedding_dimensions
    }

    async fn embed(&self, text: &str) -> recall_core::Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch
            .pop()
            .ok_or_else(|| recall_core::Error::msg("embedding response was empty"))
    }

    async fn embed_batch(
        &self,
        texts: &[impl AsRef<str> + Sync],
    ) -> recall_core::Result<Vec<Vec<f32>>> {
        let cfg = self.config();
        let mut out = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH) {
            let inputs: Vec<&str> = chunk.iter().map(AsRef::as_ref).collect();
            let request = EmbeddingRequest {
                model: &cfg.embedding_model,
                input: &inputs,
            };

            let response = cfg
                .http
                .post(cfg.request_url("/embeddings"))
                .bearer_auth(&cfg.api_key)
                .json(&request)
                .send()
                .await
                .map_err(OpenAIError::from)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(recall_core::Error::msg(format!(
                    "embedding request failed (HTTP {status}): {body}"
                )));
            }

            let parsed: EmbeddingResponse = response.json().await.map_err(OpenAIError::from)?;
            out.extend(parsed.data.into_iter().map(|item| item.embedding));
        }

        Ok(out)
    }
}
