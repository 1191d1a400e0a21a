use std::fmt;
use std::time::Duration;

/// Boxed upstream cause carried by [`RetrievalError::Upstream`].
pub type UpstreamCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissing,
    ConfigParseError,
    InvalidRequest,
    InvalidFilter,
    EmbeddingUnavailable,
    VectorStoreUnavailable,
    Cancelled,
    DeadlineExceeded,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigMissing => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidRequest => "E2001",
            Self::InvalidFilter => "E2002",
            Self::EmbeddingUnavailable => "E3001",
            Self::VectorStoreUnavailable => "E3002",
            Self::Cancelled => "E4001",
            Self::DeadlineExceeded => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigMissing => "Required service configuration missing",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidRequest => "Invalid retrieval request",
            Self::InvalidFilter => "Invalid metadata filter",
            Self::EmbeddingUnavailable => "Embedding service unavailable",
            Self::VectorStoreUnavailable => "Vector store unavailable",
            Self::Cancelled => "Retrieval cancelled",
            Self::DeadlineExceeded => "Retrieval deadline exceeded",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing => {
                Some("Set CHROMA_API_KEY, CHROMA_TENANT, CHROMA_DATABASE and OPENAI_API_KEY.")
            }
            Self::ConfigParseError => Some("Fix syntax in ragq.toml and retry."),
            Self::InvalidRequest => {
                Some("Use a non-empty query, k >= 1 and an alpha between 0 and 1.")
            }
            Self::InvalidFilter => Some("Use scalar `field=value` pairs; field names cannot start with `$`."),
            Self::EmbeddingUnavailable => Some("Check embedding credentials, quota and network access."),
            Self::VectorStoreUnavailable => {
                Some("Check vector store credentials, collection name and network access.")
            }
            Self::Cancelled => None,
            Self::DeadlineExceeded => Some("Retry with a larger --timeout-secs."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// External service that failed during dense recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamService {
    Embedding,
    VectorStore,
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding => f.write_str("embedding service"),
            Self::VectorStore => f.write_str("vector store"),
        }
    }
}

/// Failure modes of a retrieval request.
///
/// Only configuration, validation, and dense-recall failures exist here:
/// tokenizing, scoring, normalizing, and sorting are total.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Required credentials or identifiers are missing. Raised before any query runs.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid retrieval request: {0}")]
    InvalidRequest(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The embedding service or vector store failed. Not retried by the pipeline.
    #[error("{service} request failed: {source}")]
    Upstream {
        service: UpstreamService,
        #[source]
        source: UpstreamCause,
    },

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("retrieval deadline exceeded after {}ms", elapsed.as_millis())]
    DeadlineExceeded { elapsed: Duration },
}

impl RetrievalError {
    /// Wrap an upstream cause from the embedding service.
    pub fn embedding(source: impl Into<UpstreamCause>) -> Self {
        Self::Upstream {
            service: UpstreamService::Embedding,
            source: source.into(),
        }
    }

    /// Wrap an upstream cause from the vector store.
    pub fn vector_store(source: impl Into<UpstreamCause>) -> Self {
        Self::Upstream {
            service: UpstreamService::VectorStore,
            source: source.into(),
        }
    }

    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::ConfigMissing,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::InvalidFilter(_) => ErrorCode::InvalidFilter,
            Self::Upstream {
                service: UpstreamService::Embedding,
                ..
            } => ErrorCode::EmbeddingUnavailable,
            Self::Upstream {
                service: UpstreamService::VectorStore,
                ..
            } => ErrorCode::VectorStoreUnavailable,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
        }
    }

    /// Remediation text for terminal and JSON error output.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.error_code()
            .hint()
            .unwrap_or("No remediation available.")
            .to_string()
    }

    /// True for failures that happened while talking to an external service.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Cancelled | Self::DeadlineExceeded { .. }
        )
    }
}
