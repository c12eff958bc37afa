use thiserror::Error;

pub type Result<T> = std::result::Result<T, CogmapError>;

#[derive(Error, Debug)]
pub enum CogmapError {
    /// The generator answered, but nothing in the answer formed a tree.
    #[error("Could not construct mind map from AI response")]
    Unbuildable,

    /// The tree builds, but is deeper than the service will store or render.
    #[error("Mind map is {depth} levels deep (limit {limit})")]
    TooDeep { depth: usize, limit: usize },

    #[error("AI service error: {0}")]
    Ai(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl CogmapError {
    /// Short machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            CogmapError::Unbuildable => "unbuildable",
            CogmapError::TooDeep { .. } => "too_deep",
            CogmapError::Ai(_) => "ai",
            CogmapError::Storage(_) => "storage",
            CogmapError::NotFound(_) => "not_found",
            CogmapError::InvalidInput(_) => "invalid_input",
            CogmapError::Pdf(_) => "pdf",
            CogmapError::Encoding(_) => "encoding",
        }
    }
}
