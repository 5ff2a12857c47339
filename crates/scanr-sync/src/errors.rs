use std::time::Duration;

use scanr_store::BusError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("response is not a valid preference document: {0}")]
    Parse(String),

    #[error("response document has no members")]
    EmptyDocument,

    #[error("no response from director within {0:?}")]
    Timeout(Duration),

    #[error("synchronization cancelled")]
    Cancelled,

    #[error("response channel closed before a reply arrived")]
    ChannelClosed,

    #[error("messaging channel is not available")]
    ChannelUnavailable,

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}
