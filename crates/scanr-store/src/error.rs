use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation failed on {key}: {reason}")]
    Operation { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),
    #[error("subscription to {0} failed")]
    Subscribe(String),
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
}
