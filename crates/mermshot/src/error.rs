pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to launch browser: {message}")]
    Launch { message: String },

    #[error("browser {operation} failed: {message}")]
    Browser {
        operation: &'static str,
        message: String,
    },

    #[error("Mermaid render error: {message}")]
    Render { message: String },

    #[error("rendered SVG is not well-formed: {0}")]
    InvalidSvg(#[from] roxmltree::Error),

    #[error("unexpected reply from the shell page: {message}")]
    PageProtocol { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn browser(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Browser {
            operation,
            message: err.to_string(),
        }
    }
}
