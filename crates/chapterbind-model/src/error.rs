use std::path::PathBuf;
use thiserror::Error;

/// Boxed underlying cause carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can stop a chapter from becoming a document.
///
/// Each failure aborts the chapter it belongs to, never the session.
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("failed to discover chapters at {url}: {reason}")]
    Discovery { url: String, reason: String },

    #[error("failed to resolve pages of {url}: {reason}")]
    Resolution { url: String, reason: String },

    #[error("invalid content type '{content_type}' for {url}")]
    InvalidContent { url: String, content_type: String },

    #[error("failed to decode image from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("workspace error at {}: {reason}", path.display())]
    Workspace { path: PathBuf, reason: String },

    #[error("failed to write document {}: {reason}", path.display())]
    Document { path: PathBuf, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },
}

impl ChapterError {
    /// Short, stable label used when reporting failures.
    pub fn kind(&self) -> &'static str {
        match self {
            ChapterError::Discovery { .. } => "discovery",
            ChapterError::Resolution { .. } => "resolution",
            ChapterError::InvalidContent { .. } => "invalid-content",
            ChapterError::Decode { .. } => "decode",
            ChapterError::Workspace { .. } => "workspace",
            ChapterError::Document { .. } => "document",
            ChapterError::Transport { .. } => "transport",
        }
    }

    /// Whether a retry of the same request might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChapterError::Transport { .. })
    }

    pub fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ChapterError::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn workspace(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ChapterError::Workspace {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
