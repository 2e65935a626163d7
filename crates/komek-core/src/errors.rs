/// Core error type for the bot.
///
/// The adapter crate maps these into user-facing replies at the handler
/// boundary; nothing in this taxonomy is allowed to crash the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// User mistakes (bad input, unknown record, duplicate) are logged at
    /// info; everything else is an operator problem.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::Conflict(_) | Error::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
