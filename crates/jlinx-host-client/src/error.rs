use thiserror::Error;

use jlinx_ledger::LedgerError;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    /// Connection failure or any HTTP status >= 400
    #[error("request failed url=\"{url}\": {message}")]
    RequestFailed { url: String, message: String },

    /// The host replied with a body we could not parse
    #[error("invalid response from url=\"{url}\": {message}")]
    InvalidResponse { url: String, message: String },

    #[error("invalid publicKey from {0}")]
    InvalidPublicKey(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<HostError> for LedgerError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::RequestFailed { url, message }
            | HostError::InvalidResponse { url, message } => LedgerError::Transport { url, message },
            HostError::InvalidPublicKey(url) => LedgerError::Transport {
                message: format!("invalid publicKey from {}", url),
                url,
            },
            HostError::Client(message) => LedgerError::Transport {
                url: String::new(),
                message,
            },
        }
    }
}
