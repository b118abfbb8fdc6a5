use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{ReleaseSource, UpdateInfo, parse_version};
use crate::error::Error;

const DEFAULT_CHANNEL: &str = "latest";

/// A static directory of release files described by a channel manifest.
///
/// The manifest is electron-builder's `<channel>.yml`:
///
/// ```yaml
/// version: 1.2.0
/// files:
///   - url: app-1.2.0-setup.exe
///     sha512: ...
///     size: 1234
/// path: app-1.2.0-setup.exe
/// sha512: ...
/// releaseDate: '2026-03-01T12:00:00.000Z'
/// ```
///
/// Feeds without a YAML manifest may publish the same fields as
/// `<channel>.json`.
pub struct GenericFeed {
    base: Url,
    channel: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedManifest {
    version: String,
    #[serde(default)]
    files: Vec<FeedFile>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    sha512: Option<String>,
    #[serde(default)]
    release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    release_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedFile {
    url: String,
    #[serde(default)]
    sha512: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl GenericFeed {
    pub fn new(url: &str) -> crate::Result<Self> {
        let mut base =
            Url::parse(url).map_err(|e| Error::Config(format!("Invalid feed URL `{url}`: {e}")))?;
        // `join` replaces the last segment unless the base ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, channel: DEFAULT_CHANNEL.to_string() })
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    fn resolve(&self, reference: &str) -> crate::Result<Url> {
        self.base
            .join(reference)
            .map_err(|e| Error::Config(format!("Invalid feed reference `{reference}`: {e}")))
    }

    fn manifest_url(&self, extension: &str) -> crate::Result<Url> {
        self.resolve(&format!("{}.{extension}", self.channel))
    }

    async fn fetch_manifest(&self, client: &reqwest::Client) -> crate::Result<FeedManifest> {
        let resp = client.get(self.manifest_url("yml")?).send().await?;
        if resp.status() != StatusCode::NOT_FOUND {
            let body = resp.error_for_status()?.text().await?;
            return Ok(serde_yaml::from_str(&body)?);
        }

        log::debug!("No {}.yml in feed, trying {}.json", self.channel, self.channel);
        Ok(client.get(self.manifest_url("json")?).send().await?.error_for_status()?.json().await?)
    }

    fn update_info(&self, manifest: FeedManifest, version: String) -> crate::Result<UpdateInfo> {
        let (reference, sha512, size) = match manifest.files.into_iter().next() {
            Some(file) => (file.url, file.sha512.or(manifest.sha512), file.size),
            None => match manifest.path {
                Some(path) => (path, manifest.sha512, None),
                None => return Err(Error::Config("Feed manifest lists no files".into())),
            },
        };

        let mut info = UpdateInfo::new(version, self.resolve(&reference)?.to_string());
        info.sha512 = sha512;
        info.size = size;
        info.release_date = manifest.release_date;
        info.release_notes = manifest.release_notes;
        Ok(info)
    }
}

#[async_trait]
impl ReleaseSource for GenericFeed {
    fn describe(&self) -> String {
        format!("{} ({})", self.base, self.channel)
    }

    async fn latest(
        &self,
        client: &reqwest::Client,
        current: &semver::Version,
    ) -> crate::Result<Option<UpdateInfo>> {
        let manifest = self.fetch_manifest(client).await?;

        let remote = parse_version(&manifest.version)?;
        if remote <= *current {
            log::debug!("Feed offers v{remote}, running v{current}");
            return Ok(None);
        }

        let info = self.update_info(manifest, remote.to_string())?;
        log::info!("Update found: v{} at {}", info.version, info.download_url);
        Ok(Some(info))
    }
}
