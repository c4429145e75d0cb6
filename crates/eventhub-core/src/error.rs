use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur in Event Hub.
/// It uses the `thiserror` crate for ergonomic error handling and automatic conversion
/// from underlying library errors.
///
/// # Error Conversion
///
/// Most errors automatically convert from their source types using the `#[from]` attribute:
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `std::io::Error` → `AppError::IoError`
///
/// # Examples
///
/// ```no_run
/// use eventhub_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     // Errors automatically convert
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// This error wraps all errors from SQLx database operations, including
    /// connection failures, query errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP request reached the source but was answered with an error status.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A page envelope was valid JSON but did not have the expected shape.
    ///
    /// The most common cause is a response without a `data` member.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// URL parsing failed.
    ///
    /// This error occurs when a location template does not produce a valid URL
    /// after placeholder substitution.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Record keys must be non-empty.
    #[error("key could not be empty")]
    EmptyKey,

    /// An import for this source is already in flight.
    #[error("Import already running for source: {0}")]
    ImportRunning(String),

    /// The requested source is not configured.
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Configuration file missing, unreadable, or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Local file access failed (snapshots, configuration).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Network or connection error.
    ///
    /// This error occurs when a network request fails due to connectivity issues,
    /// DNS resolution failures, or the remote server being unreachable.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    ///
    /// This error occurs when a request takes longer than the configured timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants
    /// for better error handling and debugging.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Check DATABASE_URL or switch storage.adapter to \"memory\".".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("404") {
                    format!("Source endpoint not found: {}\n   Check fetching_url / update_url in the config file.", msg)
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::DecodingError(msg) => {
                format!(
                    "The source answered with an unexpected payload: {}\n   A JSON object with a \"data\" member is required.",
                    msg
                )
            }
            AppError::ImportRunning(source) => {
                format!(
                    "An import for '{}' is already running.\n   Wait for it to finish and try again.",
                    source
                )
            }
            AppError::SourceNotFound(source) => {
                format!(
                    "Unknown source: {}\n   Run `eventhub sources` to list configured sources.",
                    source
                )
            }
            AppError::ConfigError(msg) => {
                format!("Configuration error: {}\n   Pass --config <PATH> or set EVENTHUB_CONFIG.", msg)
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!("Request timed out after {} seconds.\n   The source may be overloaded. Try again later.", secs)
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventhub_core::error::AppError;
    ///
    /// // Network errors are retryable
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// // A second concurrent import is NOT retryable
    /// let err = AppError::ImportRunning("members".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::ClientError(_)
        )
    }
}
