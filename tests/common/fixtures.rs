//! Release fixtures written into a feed directory.

#![allow(dead_code)]

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest as _, Sha512};

/// Base64-encoded SHA-512, the digest format used in feed manifests.
pub fn sha512_base64(bytes: &[u8]) -> String {
    BASE64.encode(Sha512::digest(bytes))
}

/// Artifact body large enough to produce several progress events.
pub fn artifact_bytes() -> Vec<u8> {
    (0..256 * 1024).map(|i| (i % 251) as u8).collect()
}

fn release_manifest(version: &str, artifact: &str, bytes: &[u8], sha512: &str) -> serde_json::Value {
    serde_json::json!({
        "version": version,
        "files": [{ "url": artifact, "sha512": sha512, "size": bytes.len() }],
        "path": artifact,
        "sha512": sha512,
        "releaseDate": "2026-03-01T12:00:00.000Z",
        "releaseNotes": "Fixes and improvements"
    })
}

/// Write `<artifact>` and a `latest.yml` pointing at it, as electron-builder does.
pub fn write_release(dir: &Path, version: &str, artifact: &str, bytes: &[u8], sha512: &str) {
    std::fs::write(dir.join(artifact), bytes).expect("failed to write artifact");
    let manifest = release_manifest(version, artifact, bytes, sha512);
    std::fs::write(
        dir.join("latest.yml"),
        serde_yaml::to_string(&manifest).expect("failed to serialize manifest"),
    )
    .expect("failed to write manifest");
}

/// Same release described by `latest.json` only.
pub fn write_json_release(dir: &Path, version: &str, artifact: &str, bytes: &[u8], sha512: &str) {
    std::fs::write(dir.join(artifact), bytes).expect("failed to write artifact");
    let manifest = release_manifest(version, artifact, bytes, sha512);
    std::fs::write(
        dir.join("latest.json"),
        serde_json::to_string_pretty(&manifest).expect("failed to serialize manifest"),
    )
    .expect("failed to write manifest");
}
