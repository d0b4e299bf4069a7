use thiserror::Error;

#[derive(Error, Debug)]
pub enum GreenroomError {
    #[error("Not in a greenroom project. Run 'greenroom init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .greenroom/ to reinitialize.")]
    AlreadyInitialized,

    #[error("{object_type} not found: {id}")]
    NotFound { object_type: String, id: String },

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl GreenroomError {
    /// True for failures a caller can recover from by fixing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GreenroomError::Validation(_)
                | GreenroomError::Authorization(_)
                | GreenroomError::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GreenroomError>;
