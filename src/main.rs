/*!
 * sandboxd - Sandbox Controller Daemon
 *
 * Hosts a sandbox controller until interrupted:
 * - Configuration from SANDBOXD_* environment
 * - Structured tracing
 * - Clean teardown of every sandbox on Ctrl+C
 */

use anyhow::Context;
use sandbox_controller::{init_tracing, ControllerConfig, SandboxController};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("sandboxd starting...");

    let config = ControllerConfig::from_env().context("Failed to load controller configuration")?;
    info!(
        backend = ?config.backend,
        cgroup_root = %config.cgroup_root.display(),
        netns_dir = %config.netns_dir.display(),
        "Configuration loaded"
    );

    let controller = SandboxController::new(config).context("Failed to build sandbox controller")?;

    let capabilities: Vec<_> = controller
        .capabilities()
        .names()
        .map(|n| n.to_string())
        .collect();
    info!(subsystems = ?capabilities, "Resource subsystems discovered");

    info!("sandboxd ready, press Ctrl+C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutdown requested");
    let removed = controller.shutdown().await;
    info!(removed, "sandboxd stopped");
    Ok(())
}
