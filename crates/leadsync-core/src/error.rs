use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error talking to {service}: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("authentication with {service} failed: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },

    #[error("deal not found: {0}")]
    DealNotFound(i64),

    #[error("no row linked to deal {0}")]
    RowNotFound(i64),

    #[error("column not found in header: {0}")]
    ColumnNotFound(String),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl SyncError {
    /// Transport-kind constructor used by both vendor clients.
    pub fn transport(service: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            service,
            message: message.into(),
        }
    }

    pub fn auth(service: &'static str, message: impl Into<String>) -> Self {
        Self::Auth {
            service,
            message: message.into(),
        }
    }

    /// True for the NotFound family (absent deal, row, or column).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DealNotFound(_) | Self::RowNotFound(_) | Self::ColumnNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
