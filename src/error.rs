use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigatorError {
    #[error("Unsupported file format: '{file_name}' (expected .xlsx or .xls)")]
    InvalidFormat { file_name: String },

    #[error("Failed to parse workbook: {0}")]
    Parse(String),

    #[error("Transfer stalled: no data received for {millis}ms")]
    Timeout { millis: u64 },

    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl NavigatorError {
    /// Stable reason code surfaced to the presentation layer
    pub fn code(&self) -> &'static str {
        match self {
            NavigatorError::InvalidFormat { .. } => "invalid_format",
            NavigatorError::Parse(_) => "parse_error",
            NavigatorError::Timeout { .. } => "timeout",
            NavigatorError::Cancelled => "cancelled",
            NavigatorError::Io(_) => "io_error",
            NavigatorError::Toml(_) => "config_error",
            NavigatorError::Json(_) => "serialization_error",
            NavigatorError::Config(_) => "config_error",
            NavigatorError::Unsupported(_) => "unsupported",
        }
    }

    /// Whether retrying the same operation can succeed without changing the input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NavigatorError::Timeout { .. } | NavigatorError::Cancelled | NavigatorError::Io(_)
        )
    }
}

impl From<csv::Error> for NavigatorError {
    fn from(err: csv::Error) -> Self {
        NavigatorError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavigatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_retryability() {
        let invalid = NavigatorError::InvalidFormat { file_name: "report.docx".to_string() };
        assert_eq!(invalid.code(), "invalid_format");
        assert!(!invalid.is_retryable());

        let timeout = NavigatorError::Timeout { millis: 30_000 };
        assert_eq!(timeout.code(), "timeout");
        assert!(timeout.is_retryable());

        assert!(!NavigatorError::Parse("no header".into()).is_retryable());
        assert!(NavigatorError::Cancelled.is_retryable());
    }
}
