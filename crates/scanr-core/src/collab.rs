use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use scanr_model::{Preferences, ScanId, ScanLimits};

/// Plugin metadata cache filled before a scan may run.
#[async_trait]
pub trait PluginCache: Send + Sync {
    /// Load plugin metadata. Returns the number of plugins available.
    async fn load(&self, prefs: &Preferences) -> anyhow::Result<usize>;
}

/// Everything the attack network gets when the scan is handed over.
#[derive(Clone)]
pub struct AttackContext {
    pub scan_id: ScanId,
    pub preferences: Preferences,
    pub limits: ScanLimits,
    /// Cancelled when the scan process is asked to stop.
    pub cancel: CancellationToken,
}

/// Consumer that fans a prepared scan out across hosts and checks.
#[async_trait]
pub trait AttackNetwork: Send + Sync {
    async fn run(&self, ctx: AttackContext) -> anyhow::Result<()>;
}
