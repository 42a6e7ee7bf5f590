pub mod embedding;
pub mod index;

pub use embedding::{cosine_similarity, embed_text};
pub use index::{ApiDocument, DocumentIndex};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read api documentation {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("api documentation directory {path} contains no supported documents")]
    EmptyCatalog { path: String },
    #[error("invalid api documentation in {path}: {reason}")]
    InvalidDocument { path: String, reason: String },
    #[error("unknown documentation source `{source_locator}`")]
    UnknownSource { source_locator: String },
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedApi {
    pub api_name: String,
    pub source: String,
    pub text: String,
    pub similarity: f32,
}

/// Semantic search over API documentation.
pub trait CapabilityIndex {
    /// At most `top_k` hits, best first.
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedApi>, IndexError>;

    /// Full documentation text behind a `source` locator returned by [`retrieve`].
    ///
    /// [`retrieve`]: CapabilityIndex::retrieve
    fn documentation(&self, source: &str) -> Result<String, IndexError>;
}
