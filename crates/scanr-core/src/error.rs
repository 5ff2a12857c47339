use thiserror::Error;

use scanr_model::ScanState;
use scanr_store::StoreError;
use scanr_sync::SyncError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no process recorded for scan {0}")]
    ScanNotFound(String),

    #[error("scan {scan_id} has no valid process group to signal (recorded: {recorded:?})")]
    InvalidSignalTarget { scan_id: String, recorded: String },

    #[error("invalid state transition {from} -> {to}")]
    InvalidState { from: ScanState, to: ScanState },

    #[error("plugin cache load failed: {0}")]
    PluginCache(String),

    #[error("attack network failed: {0}")]
    AttackNetwork(String),

    #[error("signal setup failed: {0}")]
    Signal(String),

    #[error("failed to signal process group {pgid}: {reason}")]
    Kill { pgid: i32, reason: String },

    #[error("preference synchronization failed: {0}")]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
