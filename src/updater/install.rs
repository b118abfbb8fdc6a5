//! Platform installers: put the downloaded artifact in place and start it.

use std::path::Path;
#[cfg(not(target_os = "windows"))]
use std::path::PathBuf;
use std::process::Command;

/// Install `artifact` and launch the updated application. Does not quit.
pub(crate) fn launch(artifact: &Path) -> anyhow::Result<()> {
    if !artifact.exists() {
        anyhow::bail!("Downloaded update is missing: {}", artifact.display());
    }
    platform_launch(artifact)
}

#[cfg(target_os = "macos")]
fn platform_launch(zip_path: &Path) -> anyhow::Result<()> {
    // Running from .app bundle → replace in-place, otherwise install to /Applications/
    let app_bundle = match std::env::current_exe() {
        Ok(exe) => match exe.parent().and_then(|p| p.parent()).and_then(|p| p.parent()) {
            Some(bundle) if bundle.extension().is_some_and(|e| e == "app") => bundle.to_path_buf(),
            _ => {
                log::info!("Not running from .app bundle, will install to /Applications/");
                applications_bundle(zip_path)
            }
        },
        Err(e) => {
            log::error!("Cannot get current exe: {e}");
            applications_bundle(zip_path)
        }
    };

    swap_app_bundle(&app_bundle, zip_path)?;
    Command::new("open").arg("-n").arg(&app_bundle).spawn()?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn applications_bundle(zip_path: &Path) -> PathBuf {
    let name = zip_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('-').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("App");
    PathBuf::from("/Applications").join(format!("{name}.app"))
}

/// Extract zip, swap .app bundle, clean up.
#[cfg(target_os = "macos")]
fn swap_app_bundle(app_bundle: &Path, zip_path: &Path) -> anyhow::Result<()> {
    let parent = app_bundle.parent().unwrap_or_else(|| Path::new("/tmp"));
    let temp_dir = parent.join(".deskbridge-update-tmp");
    let _ = std::fs::remove_dir_all(&temp_dir);
    std::fs::create_dir_all(&temp_dir)?;

    let extract = Command::new("ditto").args(["-x", "-k"]).arg(zip_path).arg(&temp_dir).output()?;
    if !extract.status.success() {
        let _ = std::fs::remove_dir_all(&temp_dir);
        anyhow::bail!("ditto extraction failed: {}", String::from_utf8_lossy(&extract.stderr));
    }

    let extracted_app = std::fs::read_dir(&temp_dir)?.find_map(|e| {
        let path = e.ok()?.path();
        if path.extension().is_some_and(|ext| ext == "app") { Some(path) } else { None }
    });
    let Some(extracted_app) = extracted_app else {
        let _ = std::fs::remove_dir_all(&temp_dir);
        anyhow::bail!("No .app found in extracted update");
    };

    if app_bundle.exists() {
        let backup = app_bundle.with_extension("app.bak");
        let _ = std::fs::remove_dir_all(&backup);

        if !Command::new("mv").arg(app_bundle).arg(&backup).output()?.status.success() {
            let _ = std::fs::remove_dir_all(&temp_dir);
            anyhow::bail!("Failed to move current app to backup");
        }
        if !Command::new("mv").arg(&extracted_app).arg(app_bundle).output()?.status.success() {
            // Restore backup
            let _ = Command::new("mv").arg(&backup).arg(app_bundle).output();
            let _ = std::fs::remove_dir_all(&temp_dir);
            anyhow::bail!("Failed to move extracted app into place");
        }
        let _ = std::fs::remove_dir_all(&backup);
    } else if !Command::new("mv").arg(&extracted_app).arg(app_bundle).output()?.status.success() {
        let _ = std::fs::remove_dir_all(&temp_dir);
        anyhow::bail!("Failed to move app to {}", app_bundle.display());
    }

    let _ = std::fs::remove_dir_all(&temp_dir);
    let _ = std::fs::remove_file(zip_path);
    Ok(())
}

#[cfg(target_os = "windows")]
fn platform_launch(installer: &Path) -> anyhow::Result<()> {
    Command::new(installer).arg("--updated").spawn()?;
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_launch(artifact: &Path) -> anyhow::Result<()> {
    let target = match std::env::var_os("APPIMAGE") {
        Some(appimage) => {
            let appimage = PathBuf::from(appimage);
            replace_file(artifact, &appimage)?;
            appimage
        }
        None => artifact.to_path_buf(),
    };
    make_executable(&target)?;
    Command::new(&target).spawn()?;
    Ok(())
}

/// Copy next to `target` first so the final rename stays on one filesystem.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn replace_file(source: &Path, target: &Path) -> anyhow::Result<()> {
    let staged = target.with_extension("update");
    std::fs::copy(source, &staged)?;
    std::fs::rename(&staged, target)?;
    let _ = std::fs::remove_file(source);
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(any(unix, target_os = "windows")))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_rejected() {
        let dir = tempfile::TempDir::new().expect("failed to create temp dir");
        let err = launch(&dir.path().join("gone.zip")).unwrap_err();
        assert!(err.to_string().starts_with("Downloaded update is missing"));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn replace_file_swaps_contents() {
        let dir = tempfile::TempDir::new().expect("failed to create temp dir");
        let source = dir.path().join("new.AppImage");
        let target = dir.path().join("App.AppImage");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(&target, b"old").unwrap();

        replace_file(&source, &target).unwrap();
        make_executable(&target).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!source.exists());
        use std::os::unix::fs::PermissionsExt as _;
        assert_eq!(std::fs::metadata(&target).unwrap().permissions().mode() & 0o111, 0o111);
    }
}
