/// Core error type for the bot.
///
/// The first six variants are the closed set of failures the dialogs and the
/// cache reason about. Adapter crates map their transport-specific errors into
/// this type so handlers can decide between "tell the user" and "re-prompt".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("keyword not found: {0}")]
    NotFound(String),

    #[error("keyword already exists: {0}")]
    KeywordExists(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("a dialog is already active for this session")]
    Conflict,

    #[error("shortener listing unavailable: {0}")]
    Unavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
