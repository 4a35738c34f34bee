/// HTTP vector index client
///
/// Talks to a similarity service exposing a single JSON endpoint:
///
/// `POST {base_url}/query` with `{"vector": [...], "top_k": n}` returns
/// `{"matches": [{"movie_id": 603, "score": 0.91}, ...]}`.
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::VectorMatch,
    services::providers::{ensure_dimension, VectorIndex},
};

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Clone)]
pub struct HttpVectorIndex {
    http_client: HttpClient,
    base_url: String,
    dimension: usize,
}

impl HttpVectorIndex {
    /// Creates a client whose requests give up after `timeout`
    pub fn new(base_url: String, dimension: usize, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
        })
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }
}

#[async_trait::async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<VectorMatch>> {
        ensure_dimension(vector, self.dimension)?;

        let response = self
            .http_client
            .post(self.query_url())
            .json(&QueryRequest { vector, top_k })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Vector index query failed");
            return Err(AppError::VectorIndex(format!(
                "Index returned status {}: {}",
                status, body
            )));
        }

        let parsed: QueryResponse = response.json().await?;

        tracing::debug!(
            top_k,
            matches = parsed.matches.len(),
            index = self.name(),
            "Vector index query completed"
        );

        Ok(parsed.matches)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
