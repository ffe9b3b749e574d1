use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid bucket boundaries: {0}")]
    InvalidBuckets(String),

    #[error("Report interval must be greater than zero")]
    InvalidInterval,

    #[error("Metric '{name}' already registered as {actual}, requested as {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Reporter error: {0}")]
    Reporter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for metron operations
pub type Result<T> = std::result::Result<T, MetricsError>;

impl MetricsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new bucket boundary error
    pub fn invalid_buckets<S: Into<String>>(msg: S) -> Self {
        Self::InvalidBuckets(msg.into())
    }

    /// Creates a new reporter error
    pub fn reporter<S: Into<String>>(msg: S) -> Self {
        Self::Reporter(msg.into())
    }

    /// Returns true for errors raised while validating configuration or
    /// constructor arguments.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidBuckets(_) | Self::InvalidInterval | Self::Yaml(_)
        )
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidInterval | Self::Yaml(_) => "config",
            Self::InvalidBuckets(_) => "validation",
            Self::KindMismatch { .. } => "registry",
            Self::Reporter(_) => "reporter",
            Self::Io(_) => "io",
            Self::Json(_) => "serialization",
        }
    }
}
