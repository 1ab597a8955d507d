use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Interrupted")]
    Cancelled,

    #[error("Input ended before a choice was made")]
    InputTerminated,

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("Rule '{rule}' could not be evaluated: {reason}")]
    RuleEvaluation { rule: String, reason: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl TallyError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TallyError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
