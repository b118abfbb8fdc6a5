use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;

use super::{ReleaseSource, UpdateInfo, parse_version};

const GITHUB_API: &str = "https://api.github.com/repos";

/// Asset name pattern for the platform this binary was built for.
pub fn default_asset_pattern() -> &'static str {
    if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") { r"macos-arm64.*\.zip$" } else { r"macos-x86_64.*\.zip$" }
    } else if cfg!(target_os = "windows") {
        r"(?i)setup.*\.exe$"
    } else {
        r"\.AppImage$"
    }
}

/// Releases published on GitHub, with an optional rolling `nightly` tag.
pub struct GitHubReleases {
    releases_url: String,
    asset_pattern: Regex,
    allow_nightly: bool,
    build_sha: String,
}

impl GitHubReleases {
    pub fn new(owner: &str, repo: &str) -> crate::Result<Self> {
        Ok(Self {
            releases_url: format!("{GITHUB_API}/{owner}/{repo}/releases"),
            asset_pattern: Regex::new(default_asset_pattern())?,
            allow_nightly: false,
            build_sha: String::new(),
        })
    }

    /// Point at a different releases endpoint (GitHub Enterprise, tests).
    pub fn with_releases_url(mut self, url: impl Into<String>) -> Self {
        self.releases_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_asset_pattern(mut self, pattern: &str) -> crate::Result<Self> {
        self.asset_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Also offer nightly builds whose commit differs from `build_sha`.
    pub fn with_nightly(mut self, build_sha: impl Into<String>) -> Self {
        self.allow_nightly = true;
        self.build_sha = build_sha.into();
        self
    }

    fn release_info(
        &self,
        release: &serde_json::Value,
        version: String,
    ) -> Option<UpdateInfo> {
        let (download_url, size) = find_asset(release, &self.asset_pattern)?;
        let mut info = UpdateInfo::new(version, download_url);
        info.size = size;
        info.release_notes =
            release["body"].as_str().filter(|b| !b.trim().is_empty()).map(String::from);
        info.release_date = release["published_at"]
            .as_str()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|d| d.with_timezone(&Utc));
        Some(info)
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    fn describe(&self) -> String {
        self.releases_url.clone()
    }

    async fn latest(
        &self,
        client: &reqwest::Client,
        current: &semver::Version,
    ) -> crate::Result<Option<UpdateInfo>> {
        // Check both channels in parallel
        let (stable_resp, nightly_resp) = futures::join!(
            client.get(format!("{}/latest", self.releases_url)).send(),
            client.get(format!("{}/tags/nightly", self.releases_url)).send(),
        );

        // --- Stable channel ---
        let stable = match stable_resp {
            Ok(r) if r.status().is_success() => {
                let json: serde_json::Value = r.json().await?;
                let tag = json["tag_name"].as_str().unwrap_or_default();
                match parse_version(tag) {
                    Ok(remote) if remote > *current => self.release_info(&json, remote.to_string()),
                    Ok(_) => None,
                    Err(e) => {
                        log::debug!("Ignoring stable release with tag `{tag}`: {e}");
                        None
                    }
                }
            }
            Ok(r) => {
                log::debug!("Stable release lookup returned {}", r.status());
                None
            }
            Err(e) => return Err(e.into()),
        };

        // A newer stable release always wins
        if let Some(stable) = stable {
            log::info!("Update found: stable v{}", stable.version);
            return Ok(Some(stable));
        }

        if !self.allow_nightly || self.build_sha.is_empty() {
            return Ok(None);
        }

        if let Ok(r) = nightly_resp
            && r.status().is_success()
        {
            let json: serde_json::Value = r.json().await?;
            let body = json["body"].as_str().unwrap_or_default();
            if let Some(remote_sha) = parse_nightly_sha(body) {
                log::info!(
                    "Nightly check: local={}, remote={}",
                    short_sha(&self.build_sha),
                    short_sha(remote_sha)
                );
                if remote_sha != self.build_sha
                    && let Some(info) =
                        self.release_info(&json, format!("nightly ({})", short_sha(remote_sha)))
                {
                    log::info!("Update found: {}", info.version);
                    return Ok(Some(info));
                }
            }
        }

        Ok(None)
    }
}

/// Find the first asset whose name matches `pattern`; returns its URL and size.
fn find_asset(release: &serde_json::Value, pattern: &Regex) -> Option<(String, Option<u64>)> {
    release["assets"].as_array()?.iter().find_map(|a| {
        let name = a["name"].as_str()?;
        if pattern.is_match(name) {
            let url = a["browser_download_url"].as_str()?;
            Some((url.to_string(), a["size"].as_u64()))
        } else {
            None
        }
    })
}

/// Extract the commit SHA from a nightly release body.
/// Body format: "...**Commit:** abc123def..."
fn parse_nightly_sha(body: &str) -> Option<&str> {
    let marker = "**Commit:** ";
    let start = body.find(marker)? + marker.len();
    let rest = &body[start..];
    let end = rest.find(|c: char| c.is_whitespace()).unwrap_or(rest.len());
    let sha = &rest[..end];
    if sha.len() >= 7 { Some(sha) } else { None }
}

fn short_sha(sha: &str) -> &str {
    &sha[..7.min(sha.len())]
}
