/// Errors that can occur while talking to a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid CSS selector `{0}`")]
    Selector(String),

    #[error("Element not found: {0}")]
    MissingElement(String),

    #[error("Attribute `{attr}` missing on <{element}>")]
    MissingAttribute { element: String, attr: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
