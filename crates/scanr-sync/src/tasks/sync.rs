use serde_json::{Map, Value};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scanr_model::{Envelope, Preferences, ScanRef, keys};
use scanr_store::MessageBus;

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::mapping::{apply_members, parse_document};

/// Liveness-test mode installed before the director's answer is merged.
const DEFAULT_ALIVE_TEST: &str = "2";

/// Fetch the preferences of `scan_id` from the director and merge them
/// into `prefs`.
///
/// Returns the number of preferences written by the response.
pub async fn synchronize(
    bus: &dyn MessageBus,
    cfg: &SyncConfig,
    scan_id: &str,
    prefs: &Preferences,
    cancel: &CancellationToken,
) -> Result<usize, SyncError> {
    prefs.set(keys::ALIVE_TEST, DEFAULT_ALIVE_TEST);

    let members = fetch_document(bus, cfg, scan_id, cancel).await?;
    let written = apply_members(&members, prefs);

    info!(target: "scanr.sync", scan_id, written, "preferences synchronized");
    Ok(written)
}

/// Publish a `get.scan` request and wait for the matching response.
///
/// The subscription is opened before publishing. Replies that belong to
/// another request are skipped. The wait ends with an error on timeout,
/// cancellation or when the channel closes.
pub async fn fetch_document(
    bus: &dyn MessageBus,
    cfg: &SyncConfig,
    scan_id: &str,
    cancel: &CancellationToken,
) -> Result<Map<String, Value>, SyncError> {
    let info_topic = cfg.info_topic();
    let mut sub = bus.subscribe(&info_topic).await?;

    let request = Envelope::get_scan(scan_id);
    let body = serde_json::to_vec(&request)?;
    bus.publish(&cfg.command_topic(), body).await?;
    debug!(
        target: "scanr.sync",
        scan_id,
        message_id = %request.message_id,
        group_id = %request.group_id,
        topic = %cfg.command_topic(),
        "get.scan published"
    );

    let deadline = cfg.timeout.map(|t| Instant::now() + t);

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            _ = expire(deadline) => {
                let waited = cfg.timeout.unwrap_or_default();
                warn!(target: "scanr.sync", scan_id, ?waited, "director did not answer");
                return Err(SyncError::Timeout(waited));
            }
            msg = sub.recv() => msg.ok_or(SyncError::ChannelClosed)?,
        };

        let members = parse_document(&msg.payload)?;
        if correlates(&members, &request) {
            return Ok(members);
        }
        debug!(target: "scanr.sync", topic = %msg.topic, "skipping response for another request");
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// A reply belongs to `request` when it carries the request's `group_id`
/// and, if it names a scan, the same scan id.
fn correlates(members: &Map<String, Value>, request: &Envelope<ScanRef>) -> bool {
    let group = members.get("group_id").and_then(Value::as_str);
    if group != Some(request.group_id.as_str()) {
        return false;
    }
    match members.get("id") {
        Some(Value::String(id)) => *id == request.payload.id,
        Some(_) => false,
        None => true,
    }
}
