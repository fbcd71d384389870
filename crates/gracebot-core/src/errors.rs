/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the host
/// can tell a broken deployment (config) from a bad activity (validation) or a
/// failed write (storage). A missing record is not an error: lookups return
/// `Option`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid activity: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("duplicate activity id: {0}")]
    DuplicateActivity(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub(crate) fn missing(field: &'static str) -> Self {
        Error::Validation {
            field,
            reason: "required field is missing".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
