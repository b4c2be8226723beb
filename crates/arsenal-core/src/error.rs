use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArsenalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chat platform error: {0}")]
    Chat(#[from] crate::chat::ChatError),
}

pub type Result<T> = std::result::Result<T, ArsenalError>;
