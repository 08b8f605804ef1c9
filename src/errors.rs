use std::time::Duration;

use thiserror::Error;

/// Reasons a request is refused before any engine is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("at least {min} documents are required, got {count}")]
    TooFewDocuments { count: usize, min: usize },

    #[error("at most {max} documents are allowed, got {count}")]
    TooManyDocuments { count: usize, max: usize },

    #[error("persona role is required")]
    MissingRole,

    #[error("job to be done is required")]
    MissingJob,

    #[error("'{name}' is not a PDF (detected {media_type})")]
    UnsupportedFileType { name: String, media_type: String },

    #[error("no document at index {index}")]
    DocumentIndexOutOfRange { index: usize },
}

/// Failures raised while the engine is working on a valid request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineFailure {
    #[error("could not read '{document}': {reason}")]
    UnreadableDocument { document: String, reason: String },

    #[error("no usable text found in the document set")]
    NoUsableContent,

    #[error("ranking failed: {0}")]
    Ranking(String),

    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Terminal error of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("engine failure: {0}")]
    EngineFailure(#[from] EngineFailure),

    #[error("analysis exceeded the {}s processing bound", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("analysis was cancelled")]
    Cancelled,

    #[error("an analysis is already in progress")]
    Busy,
}

impl AnalysisError {
    /// Stable machine-readable code for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(RequestError::UnsupportedFileType { .. }) => {
                "UNSUPPORTED_FILE_TYPE"
            }
            AnalysisError::InvalidRequest(_) => "INVALID_REQUEST",
            AnalysisError::EngineFailure(EngineFailure::UnreadableDocument { .. }) => {
                "UNREADABLE_DOCUMENT"
            }
            AnalysisError::EngineFailure(EngineFailure::NoUsableContent) => "NO_USABLE_CONTENT",
            AnalysisError::EngineFailure(EngineFailure::Ranking(_)) => "RANKING_FAILURE",
            AnalysisError::EngineFailure(EngineFailure::Internal(_)) => "ENGINE_FAILURE",
            AnalysisError::Timeout(_) => "TIMEOUT",
            AnalysisError::Cancelled => "CANCELLED",
            AnalysisError::Busy => "BUSY",
        }
    }

    /// Message suitable for showing to the person who started the analysis.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::InvalidRequest(RequestError::TooFewDocuments { .. })
            | AnalysisError::InvalidRequest(RequestError::MissingRole)
            | AnalysisError::InvalidRequest(RequestError::MissingJob) => {
                "Upload 2+ documents, define persona and job-to-be-done to begin".to_string()
            }
            AnalysisError::InvalidRequest(RequestError::TooManyDocuments { max, .. }) => {
                format!("Maximum {max} documents allowed")
            }
            AnalysisError::InvalidRequest(RequestError::UnsupportedFileType { .. }) => {
                "Please upload PDF files only".to_string()
            }
            AnalysisError::InvalidRequest(e) => e.to_string(),
            AnalysisError::EngineFailure(EngineFailure::UnreadableDocument { document, .. }) => {
                format!("The document '{document}' could not be read. It may be corrupt or encrypted.")
            }
            AnalysisError::EngineFailure(EngineFailure::NoUsableContent) => {
                "None of the uploaded documents contain readable text".to_string()
            }
            AnalysisError::EngineFailure(_) => {
                "The analysis failed unexpectedly. Please try again.".to_string()
            }
            AnalysisError::Timeout(limit) => {
                format!(
                    "The analysis did not finish within {} seconds",
                    limit.as_secs_f64()
                )
            }
            AnalysisError::Cancelled => "The analysis was cancelled".to_string(),
            AnalysisError::Busy => {
                "An analysis is already running. Cancel it before starting another.".to_string()
            }
        }
    }
}
