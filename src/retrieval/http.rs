//! Index served by a remote search endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::index::{IndexLoader, Passage, RetrievalIndex};
use crate::error::DocentError;
use crate::provider::http::{shared_client, status_to_error};

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped {
        #[serde(alias = "results", alias = "documents")]
        passages: Vec<Passage>,
    },
    Bare(Vec<Passage>),
}

/// POSTs `{query, top_k}` to a search endpoint and reads back passages,
/// either as a bare array or wrapped in `{"passages": [..]}`.
#[derive(Debug, Clone)]
pub struct HttpRetrievalIndex {
    endpoint: reqwest::Url,
}

impl HttpRetrievalIndex {
    pub fn new(endpoint: &str) -> Result<Self, DocentError> {
        let endpoint = reqwest::Url::parse(endpoint).map_err(|e| {
            DocentError::Configuration(format!("Invalid retrieval endpoint '{endpoint}': {e}"))
        })?;
        Ok(Self { endpoint })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl RetrievalIndex for HttpRetrievalIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, DocentError> {
        debug!(top_k, "searching documentation index");
        let response = shared_client()
            .post(self.endpoint.clone())
            .json(&SearchRequest { query, top_k })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body));
        }

        let mut passages = match response.json::<SearchResponse>().await? {
            SearchResponse::Wrapped { passages } | SearchResponse::Bare(passages) => passages,
        };
        passages.truncate(top_k);
        Ok(passages)
    }
}

/// Loader for [`HttpRetrievalIndex`]; fails when no endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct HttpIndexLoader {
    endpoint: Option<String>,
}

impl HttpIndexLoader {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl IndexLoader for HttpIndexLoader {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>, DocentError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            DocentError::IndexUnavailable("no retrieval endpoint configured".into())
        })?;
        Ok(Arc::new(HttpRetrievalIndex::new(endpoint)?))
    }
}
