//! Static update feed for testing auto-update locally.
//!
//! Serves a directory (by default `./dist-updates`) holding a channel
//! manifest such as `latest.yml` and the artifacts it points at. Point the
//! bridge at it with `DESKBRIDGE_UPDATE_URL=http://localhost:5000`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use axum::extract::{Path as UrlPath, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware};
use tokio::net::TcpListener;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DIR: &str = "./dist-updates";

type FeedDir = Arc<PathBuf>;

/// Router serving files from `dir` with permissive CORS headers.
pub fn router(dir: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/", get(list_files).options(preflight))
        .route("/{*path}", get(serve_file).options(preflight))
        .layer(middleware::map_response(add_cors_headers))
        .layer(middleware::map_request(log_request))
        .with_state(Arc::new(dir.into()))
}

/// Bind `0.0.0.0:<port>` and serve `dir` until Ctrl+C.
pub async fn run(port: u16, dir: PathBuf) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let absolute = std::fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    log::info!("Update feed running at http://localhost:{port}");
    log::info!("Serving {}", absolute.display());
    log::info!("Place latest.yml and the artifacts it lists in {}", dir.display());

    axum::serve(listener, router(dir))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Update feed stopped");
        })
        .await?;
    Ok(())
}

async fn log_request(request: Request) -> Request {
    log::info!("[Update Server] {} {}", request.method(), request.uri());
    request
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, OPTIONS"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn list_files(State(dir): State<FeedDir>) -> Result<String, StatusCode> {
    let mut entries = tokio::fs::read_dir(dir.as_path()).await.map_err(|e| {
        log::error!("Cannot list {}: {e}", dir.display());
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names.join("\n"))
}

async fn serve_file(
    State(dir): State<FeedDir>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Response, StatusCode> {
    let path = resolve(&dir, &requested).ok_or(StatusCode::NOT_FOUND)?;
    let bytes = tokio::fs::read(&path).await.map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response())
}

/// Join `requested` onto `root`, refusing anything that could escape it.
fn resolve(root: &Path, requested: &str) -> Option<PathBuf> {
    let relative = Path::new(requested);
    if requested.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(relative))
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("yml" | "yaml") => "text/yaml",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
