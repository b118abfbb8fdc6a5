use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt as _;
use sha2::{Digest as _, Sha512};
use tokio::io::AsyncWriteExt as _;

use super::{DownloadProgress, UpdateInfo};
use crate::error::Error;

const FALLBACK_FILE_NAME: &str = "update.bin";

/// Stream the release artifact into `cache_dir`, verifying its SHA-512 when
/// the release carries one. The file only appears under its final name once
/// the digest matched; partial downloads live in a temp file that is removed
/// on any error. Chunks are written through `tokio::fs`.
pub(crate) async fn fetch_artifact(
    client: &reqwest::Client,
    info: &UpdateInfo,
    cache_dir: &Path,
    mut on_progress: impl FnMut(DownloadProgress),
) -> crate::Result<PathBuf> {
    tokio::fs::create_dir_all(cache_dir).await?;
    let file_name = artifact_file_name(&info.download_url);
    let dest = cache_dir.join(&file_name);

    let resp = client.get(&info.download_url).send().await?.error_for_status()?;
    let total = resp.content_length().or(info.size).filter(|t| *t > 0);

    // The temp path removes the partial file when dropped on any error
    let (file, tmp_path) = tempfile::NamedTempFile::new_in(cache_dir)?.into_parts();
    let mut file = tokio::fs::File::from_std(file);
    let mut hasher = Sha512::new();
    let mut stream = resp.bytes_stream();
    let mut transferred: u64 = 0;
    let mut last_pct: Option<u8> = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        transferred += chunk.len() as u64;

        let percent = progress_percent(transferred, total);
        if last_pct != Some(percent) {
            last_pct = Some(percent);
            on_progress(DownloadProgress { percent, transferred, total });
        }
    }
    file.flush().await?;
    drop(file);

    if let Some(expected) = &info.sha512 {
        let actual = BASE64.encode(hasher.finalize());
        if actual != *expected {
            log::warn!("Checksum mismatch for {file_name}: expected {expected}, got {actual}");
            return Err(Error::Checksum(file_name));
        }
    }

    if last_pct != Some(100) {
        on_progress(DownloadProgress { percent: 100, transferred, total });
    }

    tmp_path.persist(&dest).map_err(|e| e.error)?;
    log::info!("Downloaded {} ({transferred} bytes) to {}", info.version, dest.display());
    Ok(dest)
}

fn progress_percent(transferred: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) => (transferred.saturating_mul(100) / total).min(100) as u8,
        // No Content-Length: cap at 99 until we know it's truly done
        None => (transferred / (1024 * 100)).min(99) as u8,
    }
}

/// Last path segment of the download URL, or a fixed fallback.
fn artifact_file_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?.filter(|s| !s.is_empty()).next_back().map(String::from)
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}
