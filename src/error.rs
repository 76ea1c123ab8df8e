use thiserror::Error;

/// Failures that abort a broker request with a 500 diagnostic.
///
/// Missing instances/bindings and async-required rejections are not errors:
/// they are ordinary planned responses with their own status codes.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Malformed or incomplete behavior configuration.
    #[error("{0}")]
    Config(String),

    /// The request body could not be understood.
    #[error("invalid request payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The behavior source could not be read at startup or on reset.
    #[error("could not load behaviors from {source_name}: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("{0}")]
    Internal(String),
}

impl BrokerError {
    pub fn missing_action(action: &str) -> Self {
        Self::Config(format!("Could not find behavior for {}", action))
    }

    pub fn missing_default(action: &str) -> Self {
        Self::Config(format!("Could not find default behavior for {}", action))
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
