//! Scan lifecycle: preparation, hand-off to the attack network and stop.
use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use scanr_model::{PreferenceError, Preferences, ScanLimits, ScanState, keys};
use scanr_store::{KvStore, MessageBus};
use scanr_sync::{SyncConfig, SyncError, synchronize};

use crate::{
    collab::{AttackContext, AttackNetwork, PluginCache},
    error::ControlError,
    process::{ProcessControl, SystemProcess},
    signals::SignalMonitor,
    system,
};

/// Default location of the scanner configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/openvas/openvas.conf";

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// `key = value` file applied over the built-in defaults.
    pub config_file: Option<PathBuf>,
    /// Vendor version; falls back to the `vendor_version` preference.
    pub vendor_version: Option<String>,
    /// Install OS signal listeners on start.
    pub install_signals: bool,
    /// Harvest exited children while the attack network runs.
    ///
    /// This collects any child of the process, including ones awaited
    /// elsewhere in it, so it is only safe when the attack network runs its
    /// checks out of process.
    pub reap_children: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            config_file: Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
            vendor_version: None,
            install_signals: true,
            reap_children: false,
        }
    }
}

/// Drives one scan process from preparation to a terminal state.
pub struct ScanController {
    cfg: ControllerConfig,
    prefs: Preferences,
    store: Arc<dyn KvStore>,
    bus: Option<Arc<dyn MessageBus>>,
    plugins: Arc<dyn PluginCache>,
    attack: Arc<dyn AttackNetwork>,
    process: Arc<dyn ProcessControl>,
    signals: SignalMonitor,
    state: RwLock<ScanState>,
}

impl ScanController {
    pub fn new(
        cfg: ControllerConfig,
        store: Arc<dyn KvStore>,
        plugins: Arc<dyn PluginCache>,
        attack: Arc<dyn AttackNetwork>,
    ) -> Self {
        Self {
            cfg,
            prefs: Preferences::new(),
            store,
            bus: None,
            plugins,
            attack,
            process: Arc::new(SystemProcess),
            signals: SignalMonitor::new(),
            state: RwLock::new(ScanState::Created),
        }
    }

    /// Channel used for preference synchronization.
    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = process;
        self
    }

    /// Use `prefs` as the preference store instead of a fresh one.
    pub fn with_preferences(mut self, prefs: Preferences) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn state(&self) -> ScanState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn signals(&self) -> &SignalMonitor {
        &self.signals
    }

    fn transition(&self, next: ScanState) -> Result<(), ControlError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(ControlError::InvalidState {
                from: *state,
                to: next,
            });
        }
        debug!(target: "scanr.core", from = %*state, to = %next, "scan state");
        *state = next;
        Ok(())
    }

    fn fail(&self, err: ControlError) -> ControlError {
        error!(target: "scanr.core", error = %err, "scan failed");
        if let Err(e) = self.transition(ScanState::Failed) {
            debug!(target: "scanr.core", error = %e, "failed state not recorded");
        }
        err
    }

    /// Prepare scan `scan_id` and run it to a terminal state.
    ///
    /// Returns `Completed` or `Stopped`; every failure leaves the controller
    /// in `Failed` and is returned as an error.
    #[instrument(level = "info", target = "scanr.core", skip(self))]
    pub async fn start(&self, scan_id: &str) -> Result<ScanState, ControlError> {
        self.transition(ScanState::Initializing)?;

        self.prefs.apply_defaults();
        self.load_config();
        let bus = self.init_channel().await;
        self.apply_vendor();
        self.check_tls();

        match self.plugins.load(&self.prefs).await {
            Ok(count) => info!(target: "scanr.core", plugins = count, "plugin cache loaded"),
            Err(e) => return Err(self.fail(ControlError::PluginCache(format!("{e:#}")))),
        }

        if self.cfg.install_signals
            && let Err(e) = self.signals.install()
        {
            return Err(self.fail(ControlError::Signal(e.to_string())));
        }
        if let Err(e) = self.process.become_group_leader() {
            warn!(target: "scanr.core", error = %e, "could not become process group leader");
        }

        let cancel = CancellationToken::new();
        let stop_watch = self.watch_termination(cancel.clone());

        let synced = match bus {
            Some(bus) => {
                let sync_cfg = SyncConfig::from_preferences(&self.prefs);
                synchronize(bus.as_ref(), &sync_cfg, scan_id, &self.prefs, &cancel).await
            }
            None => Err(SyncError::ChannelUnavailable),
        };
        if let Err(e) = synced {
            stop_watch.abort();
            return Err(self.fail(e.into()));
        }

        self.transition(ScanState::Running)?;
        let limits = ScanLimits::from_preferences(&self.prefs);
        info!(
            target: "scanr.core",
            scan_id,
            max_hosts = limits.max_hosts,
            max_checks = limits.max_checks,
            "handing scan to attack network"
        );

        let ctx = AttackContext {
            scan_id: scan_id.to_string(),
            preferences: self.prefs.clone(),
            limits,
            cancel: cancel.clone(),
        };
        let outcome = self.run_attack(ctx).await;
        stop_watch.abort();

        if let Some(signo) = self.signals.termination() {
            if let Err(e) = &outcome {
                warn!(target: "scanr.core", error = %format!("{e:#}"), "attack network failed while stopping");
            }
            info!(target: "scanr.core", scan_id, signo, "scan stopped");
            self.transition(ScanState::Stopped)?;
            return Ok(ScanState::Stopped);
        }

        match outcome {
            Ok(()) => {
                info!(target: "scanr.core", scan_id, "scan completed");
                self.transition(ScanState::Completed)?;
                Ok(ScanState::Completed)
            }
            Err(e) => Err(self.fail(ControlError::AttackNetwork(format!("{e:#}")))),
        }
    }

    /// Run the attack network, reaping children as they exit.
    async fn run_attack(&self, ctx: AttackContext) -> anyhow::Result<()> {
        let run = self.attack.run(ctx);
        tokio::pin!(run);

        loop {
            tokio::select! {
                res = &mut run => return res,
                exits = self.signals.child_exits(), if self.cfg.reap_children => {
                    let reaped = self.process.reap_children();
                    debug!(target: "scanr.core", exits, reaped, "children harvested");
                }
            }
        }
    }

    /// Cancel `cancel` once a graceful-stop signal is recorded.
    fn watch_termination(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let signals = self.signals.clone();
        tokio::spawn(async move {
            let signo = signals.terminated().await;
            info!(target: "scanr.core", signo, "stop requested");
            cancel.cancel();
        })
    }

    fn load_config(&self) {
        let Some(path) = &self.cfg.config_file else {
            return;
        };
        match self.prefs.load_file(path) {
            Ok(applied) => {
                debug!(target: "scanr.core", path = %path.display(), applied, "config file loaded")
            }
            Err(PreferenceError::NotFound(_)) => {
                info!(target: "scanr.core", path = %path.display(), "no config file, using defaults")
            }
            Err(e) => warn!(target: "scanr.core", error = %e, "config file ignored"),
        }
    }

    /// Connect the messaging channel; unavailability is not fatal here.
    async fn init_channel(&self) -> Option<Arc<dyn MessageBus>> {
        let bus = self.bus.as_ref()?;
        let Some(uri) = self.prefs.get(keys::MQTT_SERVER_URI) else {
            warn!(target: "scanr.core", "no {} configured, messaging disabled", keys::MQTT_SERVER_URI);
            return None;
        };
        match bus.connect(&uri).await {
            Ok(()) => {
                debug!(target: "scanr.core", uri, "messaging channel connected");
                Some(Arc::clone(bus))
            }
            Err(e) => {
                warn!(target: "scanr.core", uri, error = %e, "messaging channel unavailable");
                None
            }
        }
    }

    fn apply_vendor(&self) {
        let vendor = self
            .cfg
            .vendor_version
            .clone()
            .or_else(|| self.prefs.get(keys::VENDOR_VERSION));
        if let Some(vendor) = vendor {
            self.prefs.set(keys::VENDOR_VERSION, vendor.clone());
            system::set_vendor_version(vendor);
        }
        info!(target: "scanr.core", "{}", system::start_message());
    }

    fn check_tls(&self) {
        if self.prefs.get_int(keys::DEBUG_TLS).is_some_and(|level| level > 0) {
            warn!(
                target: "scanr.core",
                "TLS debug is enabled and may log sensitive data; keep {} at 0 in production",
                keys::DEBUG_TLS
            );
        }
    }

    /// Stop scan `scan_id` through the shared store.
    pub async fn stop(&self, scan_id: &str) -> Result<i32, ControlError> {
        stop_scan(self.store.as_ref(), self.process.as_ref(), scan_id).await
    }
}

/// Signal the process group of scan `scan_id` to stop.
///
/// The group id comes from the scan process record. A missing record is
/// [`ControlError::ScanNotFound`]; a record that is not a strictly positive
/// pid is [`ControlError::InvalidSignalTarget`] and nothing is signalled.
/// Returns the signalled group id.
pub async fn stop_scan(
    store: &dyn KvStore,
    process: &dyn ProcessControl,
    scan_id: &str,
) -> Result<i32, ControlError> {
    let recorded = store
        .get(&keys::scan_key(scan_id))
        .await?
        .ok_or_else(|| ControlError::ScanNotFound(scan_id.to_string()))?;

    let invalid = || ControlError::InvalidSignalTarget {
        scan_id: scan_id.to_string(),
        recorded: recorded.clone(),
    };
    let pgid: i32 = recorded.trim().parse().map_err(|_| invalid())?;
    if pgid <= 0 {
        warn!(target: "scanr.core", scan_id, pgid, "refusing to signal non-positive pid");
        return Err(invalid());
    }

    process
        .kill_group(pgid, libc::SIGUSR1)
        .map_err(|e| ControlError::Kill {
            pgid,
            reason: e.to_string(),
        })?;
    info!(target: "scanr.core", scan_id, pgid, "stop signal delivered");
    Ok(pgid)
}
