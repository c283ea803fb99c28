use thiserror::Error;

/// A convenience `Result` alias using [`ShiftCrewError`].
pub type ShiftCrewResult<T> = Result<T, ShiftCrewError>;

/// Top-level error type for the ShiftCrew workspace.
///
/// Each variant corresponds to a subsystem that can produce errors. None of
/// them escape a pipeline run; they are recovered and logged where they occur.
#[derive(Error, Debug)]
pub enum ShiftCrewError {
    /// An error originating from an agent or the reasoning service.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A reasoning call exceeded its time budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the record store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error delivering to an outbound channel (connection, subscriber).
    #[error("Channel error: {0}")]
    Channel(String),

    /// An error from the HTTP/WebSocket gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShiftCrewError {
    /// Whether this error is a transport-level failure that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ShiftCrewError::Http(msg) => {
                let lower = msg.to_lowercase();
                !lower.contains("400")
                    && (lower.contains("429")
                        || lower.contains("500")
                        || lower.contains("502")
                        || lower.contains("503")
                        || lower.contains("504")
                        || lower.contains("connect")
                        || lower.contains("timed out"))
            }
            ShiftCrewError::Timeout(_) => true,
            _ => false,
        }
    }
}
