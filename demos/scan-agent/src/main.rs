use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use scanr_core::{
    AttackContext, AttackNetwork, ControllerConfig, PluginCache, ScanController, SystemProcess,
    stop_scan,
};
use scanr_exec::{Arg, Executor};
use scanr_model::{Preferences, keys};
use scanr_observe::{LoggerConfig, init_logger};
use scanr_store::{KvStore, MemoryBus, MemoryStore, MessageBus};

/// Counts `.nasl` files below the plugins folder.
struct FolderCache;

#[async_trait]
impl PluginCache for FolderCache {
    async fn load(&self, prefs: &Preferences) -> anyhow::Result<usize> {
        let Some(folder) = prefs.get(keys::PLUGINS_FOLDER) else {
            anyhow::bail!("{} is not set", keys::PLUGINS_FOLDER);
        };
        let count = match std::fs::read_dir(&folder) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "nasl"))
                .count(),
            Err(e) => {
                warn!(folder, error = %e, "plugins folder not readable, starting with an empty cache");
                0
            }
        };
        Ok(count)
    }
}

/// Runs one local command per target and keeps its output in the temp dir.
struct LocalAttack {
    exec: Executor,
}

#[async_trait]
impl AttackNetwork for LocalAttack {
    async fn run(&self, ctx: AttackContext) -> anyhow::Result<()> {
        let targets = ctx.preferences.get(keys::TARGET).unwrap_or_default();
        let tmp = scanr_fs::temp_directory()?;

        for host in targets.split(',').filter(|h| !h.is_empty()) {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let args = [Arg::from("uname"), Arg::from("-a")];
            let output = self.exec.execute_capture("uname", &args, true).await?;

            let report = tmp.join(format!("scanr-{}-{host}.txt", ctx.scan_id));
            scanr_fs::write_file(&report, &output)?;
            let size = scanr_fs::stat_size(&report).unwrap_or_default();
            info!(host, report = %report.display(), size, "host checked");
            scanr_fs::delete_file(&report)?;
        }

        info!("waiting for stop request");
        tokio::select! {
            _ = ctx.cancel.cancelled() => info!("attack network cancelled"),
            _ = tokio::time::sleep(Duration::from_secs(30)) => info!("attack network finished"),
        }
        Ok(())
    }
}

/// Stand-in for the director: answers `get.scan` with a fixed scan.
async fn spawn_director(bus: MemoryBus, context: &str) -> anyhow::Result<()> {
    let mut requests = bus.subscribe(&format!("{context}/scan/cmd/director")).await?;
    let info_topic = format!("{context}/scan/info");

    tokio::spawn(async move {
        while let Some(msg) = requests.recv().await {
            let Ok(req) = serde_json::from_slice::<Value>(&msg.payload) else {
                continue;
            };
            let reply = json!({
                "message_id": "director-1",
                "group_id": req["group_id"],
                "message_type": "scan",
                "created": req["created"],
                "id": req["id"],
                "hosts": ["127.0.0.1", "localhost"],
                "ports": ["22", "80", "443"],
                "plugins": {"single_vts": [{"oid": "1.3.6.1.4.1.25623.1.0.10330"}]},
                "safe_checks": true,
            });
            let Ok(body) = serde_json::to_vec(&reply) else {
                continue;
            };
            if let Err(e) = bus.publish(&info_topic, body).await {
                warn!(error = %e, "director reply failed");
            }
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let scan_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demo-scan".to_string());
    let config_file = std::env::var_os("SCANR_CONFIG").map(PathBuf::from);

    // 1) Logger, steered by the config file when present
    let boot = Preferences::with_defaults();
    if let Some(path) = &config_file {
        let _ = boot.load_file(path);
    }
    init_logger(&LoggerConfig::from_preferences(&boot)?)?;
    info!("logger initialized");

    // 2) Shared infrastructure
    let store = MemoryStore::new();
    store
        .set(&keys::scan_key(&scan_id), &std::process::id().to_string())
        .await?;
    let bus = MemoryBus::new();
    spawn_director(bus.clone(), "eulabeia").await?;

    // 3) Controller
    let prefs = Preferences::new();
    prefs.set(keys::MQTT_SERVER_URI, "memory://local");
    let cfg = ControllerConfig {
        config_file,
        vendor_version: Some("scanr demo".to_string()),
        ..Default::default()
    };
    let attack = LocalAttack {
        exec: Executor::new(Arc::new(store.clone())),
    };
    let controller = ScanController::new(
        cfg,
        Arc::new(store.clone()),
        Arc::new(FolderCache),
        Arc::new(attack),
    )
    .with_bus(Arc::new(bus))
    .with_preferences(prefs);

    // 4) Ask the running scan to stop after a while, the way an operator would
    let stopper = {
        let store = store.clone();
        let scan_id = scan_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            match stop_scan(&store, &SystemProcess, &scan_id).await {
                Ok(pgid) => info!(pgid, "stop requested"),
                Err(e) => warn!(error = %e, "stop failed"),
            }
        })
    };

    let state = controller.start(&scan_id).await?;
    stopper.abort();
    info!(%state, "scan finished");
    info!("merged preferences:\n{}", controller.preferences().dump());

    Ok(())
}
