//! Request handler behind the IPC transport.
//!
//! Every operation returns an [`IpcResult`]; collaborator faults (errors and
//! panics alike) are converted here and never reach the caller as raised
//! faults. Update operations are gated on an [`Updater`] having been assigned
//! through [`RequestHandler::set_updater`].

mod result;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt as _;
use parking_lot::RwLock;

pub use result::{HandlerError, IpcResult, UNKNOWN_ERROR};

use crate::shell::{Shell, SystemShell};
use crate::updater::{UpdateCheckResult, Updater};

/// The updater collaborator, once the startup sequence has provided one.
#[derive(Clone, Default)]
pub enum UpdaterSlot {
    #[default]
    Unset,
    Ready(Arc<dyn Updater>),
}

impl UpdaterSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, UpdaterSlot::Ready(_))
    }

    fn get(&self) -> Result<Arc<dyn Updater>, HandlerError> {
        match self {
            UpdaterSlot::Unset => Err(HandlerError::NotInitialized),
            UpdaterSlot::Ready(updater) => Ok(updater.clone()),
        }
    }
}

impl std::fmt::Debug for UpdaterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdaterSlot::Unset => f.write_str("Unset"),
            UpdaterSlot::Ready(_) => f.write_str("Ready"),
        }
    }
}

pub struct RequestHandler {
    updater: RwLock<UpdaterSlot>,
    shell: Arc<dyn Shell>,
}

impl Default for RequestHandler {
    fn default() -> Self {
        Self::new(Arc::new(SystemShell))
    }
}

impl RequestHandler {
    pub fn new(shell: Arc<dyn Shell>) -> Self {
        Self { updater: RwLock::new(UpdaterSlot::Unset), shell }
    }

    /// Assign the updater. A later call replaces the earlier one.
    pub fn set_updater(&self, updater: Arc<dyn Updater>) {
        let mut slot = self.updater.write();
        if slot.is_ready() {
            log::debug!("Replacing previously assigned updater");
        }
        *slot = UpdaterSlot::Ready(updater);
    }

    pub fn is_ready(&self) -> bool {
        self.updater.read().is_ready()
    }

    /// Liveness probe.
    pub async fn ping(&self) -> IpcResult<String> {
        IpcResult::Success("pong".to_string())
    }

    pub async fn open_folder(&self, path: impl AsRef<Path>) -> IpcResult<()> {
        let path = path.as_ref();
        log::debug!("open-folder {}", path.display());
        let result = guard(self.shell.open_path(path)).await;
        report("open-folder", result)
    }

    pub async fn check_for_updates(&self) -> IpcResult<UpdateCheckResult> {
        self.delegate("check-for-updates", |updater| async move {
            updater.check_for_updates().await
        })
        .await
    }

    pub async fn download_update(&self) -> IpcResult<()> {
        self.delegate("download-update", |updater| async move { updater.download_update().await })
            .await
    }

    /// On success the collaborator has already started tearing the process down.
    ///
    /// Installing moves files and spawns processes, so it runs on the blocking
    /// pool. A panic there is re-raised here and normalized like any other.
    pub async fn quit_and_install(&self) -> IpcResult<()> {
        self.delegate("quit-and-install", |updater| async move {
            match tokio::task::spawn_blocking(move || updater.quit_and_install()).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    /// Gate on the updater, then run `call` with every fault normalized.
    async fn delegate<T, F, Fut>(&self, op: &'static str, call: F) -> IpcResult<T>
    where
        F: FnOnce(Arc<dyn Updater>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        // Clone out so no lock is held across the await
        let slot = self.updater.read().get();
        let result = match slot {
            Ok(updater) => guard(call(updater)).await,
            Err(err) => Err(err),
        };
        report(op, result)
    }
}

/// Await `call`, mapping both `Err` and panics to [`HandlerError`].
async fn guard<T>(call: impl Future<Output = anyhow::Result<T>>) -> Result<T, HandlerError> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(HandlerError::from_fault(&err)),
        Err(panic) => Err(HandlerError::from_panic(panic)),
    }
}

fn report<T>(op: &str, result: Result<T, HandlerError>) -> IpcResult<T> {
    if let Err(err) = &result {
        log::warn!("{op} failed: {err}");
    }
    result.into()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::ThreadId;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    /// How a fake collaborator call should end.
    #[derive(Clone)]
    enum Outcome {
        Ok,
        Fail(&'static str),
        Panic(&'static str),
        OpaquePanic,
    }

    impl Outcome {
        fn run(&self) -> anyhow::Result<()> {
            match self {
                Outcome::Ok => Ok(()),
                Outcome::Fail(message) => Err(anyhow::anyhow!(*message)),
                Outcome::Panic(message) => panic!("{message}"),
                Outcome::OpaquePanic => std::panic::panic_any(7_u8),
            }
        }
    }

    struct FakeUpdater {
        check: Outcome,
        check_value: UpdateCheckResult,
        download: Outcome,
        install: Outcome,
        calls: AtomicUsize,
        install_thread: Mutex<Option<ThreadId>>,
    }

    impl FakeUpdater {
        fn new() -> Self {
            Self {
                check: Outcome::Ok,
                check_value: UpdateCheckResult::up_to_date(),
                download: Outcome::Ok,
                install: Outcome::Ok,
                calls: AtomicUsize::new(0),
                install_thread: Mutex::new(None),
            }
        }

        fn failing(outcome: Outcome) -> Self {
            Self { check: outcome.clone(), download: outcome.clone(), install: outcome, ..Self::new() }
        }
    }

    #[async_trait]
    impl Updater for FakeUpdater {
        async fn check_for_updates(&self) -> anyhow::Result<UpdateCheckResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check.run()?;
            Ok(self.check_value.clone())
        }

        async fn download_update(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.download.run()
        }

        fn quit_and_install(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.install_thread.lock() = Some(std::thread::current().id());
            self.install.run()
        }
    }

    #[derive(Default)]
    struct FakeShell {
        fail_with: Option<&'static str>,
        opened: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Shell for FakeShell {
        async fn open_path(&self, path: &Path) -> anyhow::Result<()> {
            self.opened.lock().push(path.to_path_buf());
            match self.fail_with {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        }
    }

    fn handler() -> RequestHandler {
        RequestHandler::new(Arc::new(FakeShell::default()))
    }

    /// Outcome of each delegating operation, collapsed to `Result<(), String>`.
    async fn run_all(handler: &RequestHandler) -> Vec<Result<(), String>> {
        vec![
            handler.check_for_updates().await.into_result().map(|_| ()),
            handler.download_update().await.into_result(),
            handler.quit_and_install().await.into_result(),
        ]
    }

    #[tokio::test]
    async fn ping_is_state_independent() {
        let handler = handler();
        assert_eq!(handler.ping().await, IpcResult::Success("pong".to_string()));

        handler.set_updater(Arc::new(FakeUpdater::failing(Outcome::Fail("x"))));
        assert_eq!(handler.ping().await, IpcResult::Success("pong".to_string()));
    }

    #[tokio::test]
    async fn delegating_operations_require_updater() {
        let handler = handler();
        assert!(!handler.is_ready());
        for outcome in run_all(&handler).await {
            assert_eq!(outcome, Err("Updater not initialized".to_string()));
        }
    }

    #[tokio::test]
    async fn download_without_updater_wire_shape() {
        let result = handler().download_update().await;
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "success": false, "error": "Updater not initialized" })
        );
    }

    #[tokio::test]
    async fn collaborator_errors_become_failures() {
        let handler = handler();
        handler.set_updater(Arc::new(FakeUpdater::failing(Outcome::Fail("disk full"))));
        for outcome in run_all(&handler).await {
            assert_eq!(outcome, Err("disk full".to_string()));
        }
    }

    #[tokio::test]
    async fn empty_errors_become_unknown() {
        let handler = handler();
        handler.set_updater(Arc::new(FakeUpdater::failing(Outcome::Fail(""))));
        for outcome in run_all(&handler).await {
            assert_eq!(outcome, Err(UNKNOWN_ERROR.to_string()));
        }
    }

    #[tokio::test]
    async fn panics_are_caught() {
        let handler = handler();
        handler.set_updater(Arc::new(FakeUpdater::failing(Outcome::Panic("updater exploded"))));
        for outcome in run_all(&handler).await {
            assert_eq!(outcome, Err("updater exploded".to_string()));
        }

        handler.set_updater(Arc::new(FakeUpdater::failing(Outcome::OpaquePanic)));
        for outcome in run_all(&handler).await {
            assert_eq!(outcome, Err(UNKNOWN_ERROR.to_string()));
        }
    }

    #[tokio::test]
    async fn check_result_passes_through() {
        let handler = handler();
        handler.set_updater(Arc::new(FakeUpdater::new()));

        let result = handler.check_for_updates().await;
        assert_eq!(result, IpcResult::Success(UpdateCheckResult::up_to_date()));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "success": true, "value": { "available": false } })
        );
    }

    #[tokio::test]
    async fn quit_and_install_fault_wire_shape() {
        let handler = handler();
        handler.set_updater(Arc::new(FakeUpdater {
            install: Outcome::Fail("disk full"),
            ..FakeUpdater::new()
        }));

        let result = handler.quit_and_install().await;
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "success": false, "error": "disk full" })
        );
    }

    #[tokio::test]
    async fn quit_and_install_runs_off_the_async_thread() {
        let handler = handler();
        let updater = Arc::new(FakeUpdater::new());
        handler.set_updater(updater.clone());

        assert_eq!(handler.quit_and_install().await, IpcResult::Success(()));
        let install_thread = (*updater.install_thread.lock()).expect("install was not called");
        assert_ne!(install_thread, std::thread::current().id());
    }

    #[tokio::test]
    async fn latest_updater_wins() {
        let handler = handler();
        let first = Arc::new(FakeUpdater::failing(Outcome::Fail("first")));
        let second = Arc::new(FakeUpdater::new());
        handler.set_updater(first.clone());
        handler.set_updater(second.clone());

        assert!(handler.download_update().await.is_success());
        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_folder_forwards_path() {
        let shell = Arc::new(FakeShell::default());
        let handler = RequestHandler::new(shell.clone());

        assert_eq!(handler.open_folder("/tmp/reports").await, IpcResult::Success(()));
        assert_eq!(*shell.opened.lock(), vec![PathBuf::from("/tmp/reports")]);
    }

    #[tokio::test]
    async fn open_folder_failures_are_normalized() {
        let shell = Arc::new(FakeShell { fail_with: Some("no file manager"), ..Default::default() });
        let handler = RequestHandler::new(shell);

        let result = handler.open_folder("/tmp/reports").await;
        assert_eq!(result, IpcResult::Failure("no file manager".to_string()));
    }

    #[tokio::test]
    async fn concurrent_checks_are_not_deduplicated() {
        let handler = handler();
        let updater = Arc::new(FakeUpdater::new());
        handler.set_updater(updater.clone());

        let (a, b) = futures::join!(handler.check_for_updates(), handler.check_for_updates());
        assert!(a.is_success() && b.is_success());
        assert_eq!(updater.calls.load(Ordering::SeqCst), 2);
    }
}
