//! Error types for the language server core.

use thiserror::Error;
use tower_lsp::lsp_types::Url;

/// Errors surfaced by the document manager and request router.
#[derive(Debug, Error)]
pub enum Error {
    /// A request referenced a document that was never opened (or already closed).
    #[error("Document not found: {uri}")]
    DocumentNotFound { uri: Url },

    /// An embedded-language adapter failed while serving a request.
    #[error("Adapter '{language_id}' failed: {message}")]
    Adapter {
        language_id: String,
        message: String,
    },

    /// The settings file exists but could not be parsed.
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
}

impl Error {
    /// Build an adapter failure for `language_id`.
    pub fn adapter(language_id: impl Into<String>, message: impl ToString) -> Self {
        Self::Adapter {
            language_id: language_id.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by capability adapters.
pub type AdapterResult<T> = std::result::Result<T, Error>;

impl From<Error> for tower_lsp::jsonrpc::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::DocumentNotFound { .. } => {
                tower_lsp::jsonrpc::Error::invalid_params(error.to_string())
            }
            other => {
                let mut rpc = tower_lsp::jsonrpc::Error::internal_error();
                rpc.message = other.to_string().into();
                rpc
            }
        }
    }
}
