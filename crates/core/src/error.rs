//! Error types for catalog extraction.
//!
//! This module defines [`ChronicleError`], which covers every failure the
//! pipeline can surface: transport and response-shape problems, missing or
//! malformed articles, classification failures and date parsing.
//!
//! Recoverable conditions (low-confidence guesses, redlink series, missing
//! optional infobox fields) never become errors. They are logged and recorded
//! as [`Diagnostic`](crate::classify::Diagnostic) entries instead.
//!
//! # Example
//!
//! ```rust
//! use chronicle_core::{ChronicleError, parse_date};
//!
//! match parse_date(Some("not a date")) {
//!     Err(ChronicleError::UnsupportedDateFormat(text)) => assert_eq!(text, "not a date"),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use thiserror::Error;

/// Main error type for extraction and classification.
#[derive(Error, Debug)]
pub enum ChronicleError {
    /// HTTP request errors from reqwest.
    ///
    /// Only available when the `fetch` feature is enabled.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The article source answered with a non-success status.
    ///
    /// Fatal to the whole batch; retries belong to the transport.
    #[error("Article source returned status {status}: {message}")]
    Fetch { status: u16, message: String },

    /// The response lacked the expected top-level structure.
    #[error("Invalid article source response: {0}")]
    InvalidResponse(String),

    /// JSON decoding errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required title has no page.
    #[error("Article does not exist: {0}")]
    MissingArticle(String),

    /// A redirect chain revisited a title it already followed.
    #[error("Redirect loop detected at: {0}")]
    RedirectLoop(String),

    /// A media article has no infobox to enrich the draft from.
    #[error("No infobox in article: {0}")]
    NoInfobox(String),

    /// The source returned a title that matches no lookup key.
    #[error("Mismatch between requested titles and the title received from the source: {0}")]
    TitleMismatch(String),

    /// A series infobox type with no entry in the series lookup table.
    #[error("Series {title} has unknown infobox type '{kind}'")]
    UnknownInfobox { title: String, kind: String },

    /// A series article with neither an infobox nor a matching first sentence.
    #[error("Cannot infer type of series {title} from sentence: {sentence}")]
    UninferableSeries { title: String, sentence: String },

    /// Drafts whose type requires a full type that stayed unset.
    #[error("No full type despite being required on {} media: {}", .0.len(), .0.join(", "))]
    UnresolvedClassification(Vec<String>),

    /// Date text with no recognizable era-relative year.
    #[error("Cannot parse date string: {0}")]
    UnsupportedDateFormat(String),

    /// The external markup parser rejected the page content.
    #[error("Failed to parse markup: {0}")]
    MarkupError(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ChronicleError.
pub type Result<T> = std::result::Result<T, ChronicleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChronicleError::MissingArticle("Andor".to_string());
        assert!(err.to_string().contains("Andor"));
    }

    #[test]
    fn test_fetch_error_status() {
        let err = ChronicleError::Fetch { status: 503, message: "maxlag".to_string() };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("maxlag"));
    }

    #[test]
    fn test_unresolved_lists_titles() {
        let err = ChronicleError::UnresolvedClassification(vec!["A".to_string(), "B".to_string()]);
        let message = err.to_string();
        assert!(message.contains("2 media"));
        assert!(message.contains("A, B"));
    }

    #[test]
    fn test_unknown_infobox() {
        let err = ChronicleError::UnknownInfobox { title: "X".to_string(), kind: "toy line".to_string() };
        assert!(err.to_string().contains("toy line"));
    }
}
