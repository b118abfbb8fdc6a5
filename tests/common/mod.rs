//! Shared helpers for integration tests.
//!
//! Update feeds are served in-process by the bridge's own feed router on an
//! ephemeral port, one server per test. No network access is needed.

#![allow(dead_code)]

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use deskbridge::shell::Shell;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// Serve `dir` over HTTP on 127.0.0.1 and return the base URL.
pub async fn spawn_feed(dir: &Path) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind feed server");
    let addr = listener.local_addr().expect("feed server has no address");
    let router = deskbridge::feed_server::router(dir.to_path_buf());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("feed server crashed");
    });
    format!("http://{addr}")
}

/// Enable log output for a test run (`RUST_LOG=debug cargo test`).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shell that records every path instead of launching anything.
#[derive(Default)]
pub struct RecordingShell {
    pub opened: Mutex<Vec<PathBuf>>,
}

impl RecordingShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Shell for RecordingShell {
    async fn open_path(&self, path: &Path) -> anyhow::Result<()> {
        self.opened.lock().push(path.to_path_buf());
        Ok(())
    }
}
