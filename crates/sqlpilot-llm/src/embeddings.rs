use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlpilot_common::{EmbeddingProvider, Error, Result};
use tracing::instrument;

const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Embeddings provider for OpenAI-compatible `/v1/embeddings` endpoints.
pub struct OpenAiCompatEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiCompatEmbeddings {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, texts: &[String]) -> EmbedRequest {
        EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&self.build_request(texts))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout("embedding request timed out".into())
                } else {
                    Error::Retrieval(format!("embedding request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Retrieval(format!(
                "embedding API error: status={status}, body={body}"
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Retrieval(format!("failed to parse embedding response: {e}")))?;

        payload.into_vectors(texts.len())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatEmbeddings {
    fn provider_id(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Retrieval("embedding API returned no vector for query".into()))
    }
}

// --- Wire types (private) ---

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbedDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl EmbedResponse {
    /// Re-align vectors with the request order via the `index` field; some
    /// compatible servers return data out of order.
    fn into_vectors(self, expected: usize) -> Result<Vec<Vec<f32>>> {
        if self.data.len() != expected {
            return Err(Error::Retrieval(format!(
                "embedding API returned {} vectors for {} inputs",
                self.data.len(),
                expected
            )));
        }

        let mut vectors: Vec<Vec<f32>> = vec![Vec::new(); expected];
        for datum in self.data {
            if datum.index >= expected {
                return Err(Error::Retrieval(format!(
                    "embedding API returned out-of-range index {}",
                    datum.index
                )));
            }
            vectors[datum.index] = datum.embedding;
        }
        Ok(vectors)
    }
}
