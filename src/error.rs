use thiserror::Error;

/// Failure taxonomy of a sync run.
///
/// Resolver problems are not in here: a failed catalog lookup degrades
/// the run (SKUs become `None`) and is carried in the
/// [`RunReport`](crate::pipeline::RunReport) instead.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Rejected before any network or database call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The order search failed. Nothing was written.
    #[error("order source unavailable: {0}")]
    SourceUnavailable(String),

    /// Insert or commit failed. The transaction was rolled back.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// A collaborator could not be constructed from configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Process exit code, distinct per failure kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::InvalidInput(_) => 2,
            SyncError::SourceUnavailable(_) => 3,
            SyncError::StorageFailure(_) => 4,
            SyncError::Config(_) => 5,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::StorageFailure(e.to_string())
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
