use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::protocol::Frame;
use crate::error::Error;
use crate::handler::{IpcResult, RequestHandler};

/// Methods the handler answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Ping,
    OpenFolder,
    CheckForUpdates,
    DownloadUpdate,
    QuitAndInstall,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Ping => "ping",
            Method::OpenFolder => "open-folder",
            Method::CheckForUpdates => "check-for-updates",
            Method::DownloadUpdate => "download-update",
            Method::QuitAndInstall => "quit-and-install",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ping" => Ok(Method::Ping),
            "open-folder" | "openFolder" => Ok(Method::OpenFolder),
            "check-for-updates" | "checkForUpdates" => Ok(Method::CheckForUpdates),
            "download-update" | "downloadUpdate" => Ok(Method::DownloadUpdate),
            "quit-and-install" | "quitAndInstall" => Ok(Method::QuitAndInstall),
            other => Err(Error::Protocol(format!("Unknown method: `{other}`"))),
        }
    }
}

/// Split `method[:correlation-id]`.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once(':') {
        Some((method, id)) => (method, Some(id)),
        None => (name, None),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenFolderParams {
    Path(PathBuf),
    Object { path: PathBuf },
}

impl OpenFolderParams {
    fn into_path(self) -> PathBuf {
        match self {
            OpenFolderParams::Path(path) | OpenFolderParams::Object { path } => path,
        }
    }
}

/// Run one request and build the reply frame. `name` is echoed verbatim.
pub async fn dispatch(handler: &RequestHandler, name: &str, payload: &str) -> Frame {
    let (method, _) = split_name(name);
    let method = match method.parse::<Method>() {
        Ok(method) => method,
        Err(err) => return Frame::error(name, err),
    };
    log::debug!("Dispatching {}", method.as_str());

    match method {
        Method::Ping => respond(name, &handler.ping().await),
        Method::OpenFolder => match serde_json::from_str::<OpenFolderParams>(payload) {
            Ok(params) => respond(name, &handler.open_folder(params.into_path()).await),
            Err(err) => Frame::error(name, format!("Invalid open-folder payload: {err}")),
        },
        Method::CheckForUpdates => respond(name, &handler.check_for_updates().await),
        Method::DownloadUpdate => respond(name, &handler.download_update().await),
        Method::QuitAndInstall => respond(name, &handler.quit_and_install().await),
    }
}

fn respond<T: Serialize>(name: &str, result: &IpcResult<T>) -> Frame {
    match serde_json::to_string(result) {
        Ok(payload) => Frame::response(name, payload),
        Err(err) => Frame::error(name, format!("Failed to serialize result: {err}")),
    }
}
