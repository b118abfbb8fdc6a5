use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedSender;
use parking_lot::Mutex;

use super::download::fetch_artifact;
use super::{ReleaseSource, UpdateCheckResult, UpdateEvent, UpdateStatus, Updater, install};
use crate::config::{UpdateProvider, UpdateSettings};
use crate::updater::{GenericFeed, GitHubReleases};

const CACHE_DIR_NAME: &str = "deskbridge";

type QuitHook = Box<dyn Fn() + Send + Sync>;

/// Checks a [`ReleaseSource`], downloads into a cache directory and installs.
pub struct AppUpdater {
    source: Box<dyn ReleaseSource>,
    client: reqwest::Client,
    current_version: semver::Version,
    cache_dir: PathBuf,
    status: Mutex<UpdateStatus>,
    events: Option<UnboundedSender<UpdateEvent>>,
    on_quit: QuitHook,
}

impl AppUpdater {
    pub fn new(source: impl ReleaseSource + 'static) -> crate::Result<Self> {
        let current_version: semver::Version = env!("CARGO_PKG_VERSION").parse()?;
        let client = reqwest::Client::builder()
            .user_agent(format!("deskbridge/{current_version}"))
            .build()?;
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_DIR_NAME);

        Ok(Self {
            source: Box::new(source),
            client,
            current_version,
            cache_dir,
            status: Mutex::new(UpdateStatus::Idle),
            events: None,
            on_quit: Box::new(|| std::process::exit(0)),
        })
    }

    /// Build the updater described by `settings`, or `None` when no provider
    /// is configured.
    pub fn from_settings(
        settings: &UpdateSettings,
        build_sha: &str,
    ) -> anyhow::Result<Option<Self>> {
        let updater = match settings.effective_provider() {
            UpdateProvider::None => return Ok(None),
            UpdateProvider::GitHub { owner, repo } => {
                let mut source = GitHubReleases::new(&owner, &repo)?;
                if let Some(pattern) = &settings.asset_pattern {
                    source = source
                        .with_asset_pattern(pattern)
                        .with_context(|| format!("Invalid asset pattern `{pattern}`"))?;
                }
                if settings.allow_nightly {
                    source = source.with_nightly(build_sha);
                }
                Self::new(source)?
            }
            UpdateProvider::Generic { url, channel } => {
                Self::new(GenericFeed::new(&url)?.with_channel(channel))?
            }
        };

        Ok(Some(match &settings.cache_dir {
            Some(dir) => updater.with_cache_dir(dir.clone()),
            None => updater,
        }))
    }

    pub fn with_current_version(mut self, version: &str) -> crate::Result<Self> {
        self.current_version = super::parse_version(version)?;
        Ok(self)
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<UpdateEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the default `process::exit(0)` run after the installer launched.
    pub fn with_quit_hook(mut self, on_quit: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_quit = Box::new(on_quit);
        self
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.lock().clone()
    }

    pub fn current_version(&self) -> &semver::Version {
        &self.current_version
    }

    fn emit(&self, event: UpdateEvent) {
        if let Some(events) = &self.events {
            // Receiver gone just means nobody is listening anymore
            let _ = events.unbounded_send(event);
        }
    }
}

#[async_trait]
impl Updater for AppUpdater {
    async fn check_for_updates(&self) -> anyhow::Result<UpdateCheckResult> {
        let previous = {
            let mut status = self.status.lock();
            if matches!(*status, UpdateStatus::Downloading { .. }) {
                anyhow::bail!("Update download already in progress");
            }
            std::mem::replace(&mut *status, UpdateStatus::Checking)
        };

        log::info!(
            "Update check: version={}, source={}",
            self.current_version,
            self.source.describe()
        );
        self.emit(UpdateEvent::CheckingForUpdate);

        match self.source.latest(&self.client, &self.current_version).await {
            Ok(Some(info)) => {
                // Same release already on disk, keep it
                let keep = matches!(
                    &previous,
                    UpdateStatus::Downloaded { info: downloaded, .. } if downloaded.version == info.version
                );
                *self.status.lock() =
                    if keep { previous } else { UpdateStatus::Available { info: info.clone() } };
                self.emit(UpdateEvent::UpdateAvailable(info.clone()));
                Ok(UpdateCheckResult::available(info))
            }
            Ok(None) => {
                *self.status.lock() = UpdateStatus::Idle;
                self.emit(UpdateEvent::UpdateNotAvailable);
                Ok(UpdateCheckResult::up_to_date())
            }
            Err(e) => {
                log::debug!("Update check failed: {e}");
                *self.status.lock() = previous;
                self.emit(UpdateEvent::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn download_update(&self) -> anyhow::Result<()> {
        let info = {
            let mut status = self.status.lock();
            match &*status {
                UpdateStatus::Available { info } => {
                    let info = info.clone();
                    *status = UpdateStatus::Downloading { info: info.clone(), progress_pct: 0 };
                    info
                }
                UpdateStatus::Downloaded { .. } => return Ok(()),
                UpdateStatus::Downloading { .. } => {
                    anyhow::bail!("Update download already in progress")
                }
                UpdateStatus::Idle | UpdateStatus::Checking => {
                    anyhow::bail!("No update available to download")
                }
            }
        };

        log::info!("Downloading v{} from {}", info.version, info.download_url);
        let result = fetch_artifact(&self.client, &info, &self.cache_dir, |progress| {
            if let UpdateStatus::Downloading { progress_pct, .. } = &mut *self.status.lock() {
                *progress_pct = progress.percent;
            }
            self.emit(UpdateEvent::DownloadProgress(progress));
        })
        .await;

        match result {
            Ok(path) => {
                *self.status.lock() = UpdateStatus::Downloaded { info: info.clone(), path };
                self.emit(UpdateEvent::UpdateDownloaded(info));
                Ok(())
            }
            Err(e) => {
                log::error!("Update download failed: {e}");
                // Back to Available so the user can retry
                *self.status.lock() = UpdateStatus::Available { info };
                self.emit(UpdateEvent::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn quit_and_install(&self) -> anyhow::Result<()> {
        let path = match &*self.status.lock() {
            UpdateStatus::Downloaded { path, .. } => path.clone(),
            _ => anyhow::bail!("No update has been downloaded"),
        };

        log::info!("Installing update from {}", path.display());
        install::launch(&path)?;
        (self.on_quit)();
        Ok(())
    }
}
