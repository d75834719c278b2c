use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::DocentError;

/// One ranked chunk of documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(alias = "text")]
    pub content: String,
    /// Page or file the passage came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            score: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Semantic search over the documentation corpus.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// At most `top_k` passages, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, DocentError>;
}

/// Builds the index. Called until one build succeeds.
#[async_trait]
pub trait IndexLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>, DocentError>;
}

/// Process-wide index handle, built once and shared by every session.
///
/// Concurrent first users wait on a single build. A failed build is not
/// remembered; the next caller tries again.
pub struct SharedIndex {
    loader: Box<dyn IndexLoader>,
    cell: OnceCell<Arc<dyn RetrievalIndex>>,
}

impl SharedIndex {
    pub fn new(loader: Box<dyn IndexLoader>) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    /// A handle around an index that is already built.
    pub fn ready(index: Arc<dyn RetrievalIndex>) -> Self {
        Self {
            loader: Box::new(Prebuilt(Arc::clone(&index))),
            cell: OnceCell::new_with(Some(index)),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn RetrievalIndex>, DocentError> {
        self.cell
            .get_or_try_init(|| async {
                match self.loader.load().await {
                    Ok(index) => {
                        info!("retrieval index ready");
                        Ok(index)
                    }
                    Err(e) => {
                        warn!(error = %e, "retrieval index build failed");
                        Err(match e {
                            DocentError::IndexUnavailable(_) => e,
                            other => DocentError::IndexUnavailable(other.to_string()),
                        })
                    }
                }
            })
            .await
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for SharedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedIndex")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

struct Prebuilt(Arc<dyn RetrievalIndex>);

#[async_trait]
impl IndexLoader for Prebuilt {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>, DocentError> {
        Ok(Arc::clone(&self.0))
    }
}
