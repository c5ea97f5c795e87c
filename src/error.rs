use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemindMeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("reminder already exists for source {0}")]
    DuplicateReminder(String),
    #[error("identity error: {0}")]
    Identity(String),
    #[error("publish error: {0}")]
    Publish(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub use crate::Result;

impl From<serde_json::Error> for RemindMeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
