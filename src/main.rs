#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use deskbridge::RequestHandler;
use deskbridge::config::{BridgeSettings, ConfigManager};
use deskbridge::ipc;
use deskbridge::shell::SystemShell;
use deskbridge::updater::AppUpdater;

/// Overrides the build SHA for nightly testing: `DESKBRIDGE_TEST_SHA=fake deskbridge`
const TEST_SHA_ENV: &str = "DESKBRIDGE_TEST_SHA";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries IPC frames
    env_logger::init();

    let settings = match ConfigManager::new().and_then(|config| config.load_settings()) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("Failed to load settings, using defaults: {err:#}");
            BridgeSettings::default()
        }
    };

    let handler = Arc::new(RequestHandler::new(Arc::new(SystemShell)));
    let (events_tx, events_rx) = futures::channel::mpsc::unbounded();

    let build_sha =
        std::env::var(TEST_SHA_ENV).unwrap_or_else(|_| env!("DESKBRIDGE_GIT_SHA").to_string());
    match AppUpdater::from_settings(&settings.updates, &build_sha) {
        Ok(Some(updater)) => handler.set_updater(Arc::new(updater.with_events(events_tx))),
        Ok(None) => log::info!("No update provider configured"),
        Err(err) => log::error!("Failed to initialize updater: {err:#}"),
    }

    log::info!("deskbridge {} listening on stdio", env!("CARGO_PKG_VERSION"));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    ipc::serve(handler, stdin, tokio::io::stdout(), Some(events_rx)).await
}
