//! Application update collaborators.
//!
//! [`Updater`] is the capability set the request handler delegates to.
//! [`AppUpdater`] is the stock implementation: it asks a [`ReleaseSource`]
//! for a newer release, downloads the artifact into a cache directory and
//! hands it to the platform installer.

mod app;
mod download;
mod generic;
mod github;
mod install;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use app::AppUpdater;
pub use generic::GenericFeed;
pub use github::{GitHubReleases, default_asset_pattern};

/// Operations the request handler forwards to an updater.
///
/// Faults are reported as `Err`; the handler turns them into failure results
/// so nothing raised here ever reaches the transport.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn check_for_updates(&self) -> anyhow::Result<UpdateCheckResult>;

    async fn download_update(&self) -> anyhow::Result<()>;

    /// Hands the downloaded artifact to the installer and quits the process.
    fn quit_and_install(&self) -> anyhow::Result<()>;
}

/// Where releases come from.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Short human-readable description used in logs.
    fn describe(&self) -> String;

    /// Newest release strictly newer than `current`, if any.
    async fn latest(
        &self,
        client: &reqwest::Client,
        current: &semver::Version,
    ) -> crate::Result<Option<UpdateInfo>>;
}

/// Outcome of an update check, passed through the handler untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResult {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_info: Option<UpdateInfo>,
}

impl UpdateCheckResult {
    pub fn up_to_date() -> Self {
        Self { available: false, update_info: None }
    }

    pub fn available(info: UpdateInfo) -> Self {
        Self { available: true, update_info: Some(info) }
    }
}

/// A release newer than the running build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub version: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Base64-encoded SHA-512 of the artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha512: Option<String>,
}

impl UpdateInfo {
    pub fn new(version: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            download_url: download_url.into(),
            release_date: None,
            release_notes: None,
            size: None,
            sha512: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Idle,
    Checking,
    Available { info: UpdateInfo },
    Downloading { info: UpdateInfo, progress_pct: u8 },
    Downloaded { info: UpdateInfo, path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub percent: u8,
    pub transferred: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Lifecycle notifications emitted by [`AppUpdater`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    CheckingForUpdate,
    UpdateAvailable(UpdateInfo),
    UpdateNotAvailable,
    DownloadProgress(DownloadProgress),
    UpdateDownloaded(UpdateInfo),
    Error(String),
}

impl UpdateEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateEvent::CheckingForUpdate => "checking-for-update",
            UpdateEvent::UpdateAvailable(_) => "update-available",
            UpdateEvent::UpdateNotAvailable => "update-not-available",
            UpdateEvent::DownloadProgress(_) => "download-progress",
            UpdateEvent::UpdateDownloaded(_) => "update-downloaded",
            UpdateEvent::Error(_) => "error",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            UpdateEvent::CheckingForUpdate | UpdateEvent::UpdateNotAvailable => {
                serde_json::Value::Null
            }
            UpdateEvent::UpdateAvailable(info) | UpdateEvent::UpdateDownloaded(info) => {
                serde_json::to_value(info).unwrap_or_default()
            }
            UpdateEvent::DownloadProgress(progress) => {
                serde_json::to_value(progress).unwrap_or_default()
            }
            UpdateEvent::Error(message) => serde_json::Value::String(message.clone()),
        }
    }
}

/// Parse a release version, tolerating a leading `v`.
pub(crate) fn parse_version(raw: &str) -> crate::Result<semver::Version> {
    let trimmed = raw.trim();
    Ok(trimmed.strip_prefix('v').unwrap_or(trimmed).parse()?)
}
