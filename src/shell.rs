//! Desktop shell integration: reveal a folder in the platform file manager.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait Shell: Send + Sync {
    async fn open_path(&self, path: &Path) -> anyhow::Result<()>;
}

const NO_ARGS: &[&str] = &[];
const GIO_ARGS: &[&str] = &["open"];

/// Opens paths with the platform's own launcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl SystemShell {
    /// Launcher command plus the arguments that precede the path.
    fn launcher() -> anyhow::Result<(OsString, &'static [&'static str])> {
        if cfg!(target_os = "macos") {
            Ok(("open".into(), NO_ARGS))
        } else if cfg!(target_os = "windows") {
            Ok(("explorer".into(), NO_ARGS))
        } else if let Ok(xdg_open) = which::which("xdg-open") {
            Ok((xdg_open.into_os_string(), NO_ARGS))
        } else if let Ok(gio) = which::which("gio") {
            Ok((gio.into_os_string(), GIO_ARGS))
        } else {
            anyhow::bail!("No desktop launcher found (tried xdg-open, gio)")
        }
    }
}

#[async_trait]
impl Shell for SystemShell {
    async fn open_path(&self, path: &Path) -> anyhow::Result<()> {
        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }

        let (program, args) = Self::launcher()?;
        log::debug!("Opening {} with {}", path.display(), program.to_string_lossy());
        let output = Command::new(&program).args(args).arg(path).output().await?;

        // explorer.exe exits with 1 even when the window opened fine
        if !output.status.success() && !cfg!(target_os = "windows") {
            anyhow::bail!(
                "{} failed: {}",
                program.to_string_lossy(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
