//! Browser surfaces for dmsweep.
//!
//! A [`SurfaceHost`] opens windows; each [`Surface`] exposes a [`PageDriver`] that
//! the locator, the action executor and the bridge talk to. [`ChromiumHost`] is the
//! real implementation over chromiumoxide; [`scripted`] provides an offline driver.

use std::{env, path::PathBuf};
use which::which;

pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod scripted;

pub use chromium::ChromiumHost;
pub use config::CdpConfig;
pub use driver::{PageDriver, Surface, SurfaceHost};
pub use error::{AdapterError, AdapterErrorKind};

/// Browser binary to launch: `DMSWEEP_CHROME`, then `PATH`, then the usual
/// install locations unless `DMSWEEP_SKIP_OS_PATHS` is set.
fn detect_chrome_executable() -> Option<PathBuf> {
    let explicit = env::var("DMSWEEP_CHROME")
        .ok()
        .map(|raw| PathBuf::from(raw.trim()))
        .filter(|path| !path.as_os_str().is_empty() && path.exists());
    if explicit.is_some() {
        return explicit;
    }

    if let Some(path) = chrome_executable_names()
        .iter()
        .find_map(|name| which(name).ok())
    {
        return Some(path);
    }

    let skip_install_dirs = env::var("DMSWEEP_SKIP_OS_PATHS").is_ok_and(|v| !v.trim().is_empty());
    if skip_install_dirs {
        return None;
    }
    install_locations().into_iter().find(|path| path.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["chrome.exe", "msedge.exe", "chromium.exe"]
    } else if cfg!(target_os = "macos") {
        &["google-chrome", "chromium"]
    } else {
        &["google-chrome-stable", "google-chrome", "chromium", "chromium-browser"]
    }
}

fn install_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .flat_map(|root| {
                let root = PathBuf::from(root.trim());
                [
                    root.join("Google/Chrome/Application/chrome.exe"),
                    root.join("Microsoft/Edge/Application/msedge.exe"),
                ]
            })
            .collect()
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".into(),
            "/Applications/Chromium.app/Contents/MacOS/Chromium".into(),
        ]
    } else {
        ["google-chrome-stable", "google-chrome", "chromium", "chromium-browser"]
            .iter()
            .map(|name| PathBuf::from("/usr/bin").join(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{chrome_executable_names, detect_chrome_executable};
    use crate::config::CdpConfig;
    use std::{env, fs};
    use tempfile::tempdir;

    // Mutates process-wide env vars.
    #[test]
    fn detection_prefers_env_then_path() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let saved_chrome = env::var("DMSWEEP_CHROME").ok();
        env::set_var("DMSWEEP_CHROME", exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        assert_eq!(detected, Some(exe_path));

        let path_dir = tempdir().unwrap();
        let name = chrome_executable_names()
            .first()
            .expect("chrome executable names must not be empty");
        let on_path = path_dir.path().join(name);
        fs::write(&on_path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&on_path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let saved_path = env::var("PATH").ok();
        let skip_flag = env::var("DMSWEEP_SKIP_OS_PATHS").ok();
        env::set_var("DMSWEEP_CHROME", "");
        env::set_var("DMSWEEP_SKIP_OS_PATHS", "1");
        env::set_var("PATH", path_dir.path());
        let from_path = detect_chrome_executable();

        if let Some(value) = saved_path {
            env::set_var("PATH", value);
        }
        match saved_chrome {
            Some(value) => env::set_var("DMSWEEP_CHROME", value),
            None => env::remove_var("DMSWEEP_CHROME"),
        }
        match skip_flag {
            Some(value) => env::set_var("DMSWEEP_SKIP_OS_PATHS", value),
            None => env::remove_var("DMSWEEP_SKIP_OS_PATHS"),
        }
        assert_eq!(from_path, Some(on_path));
    }

    #[test]
    fn default_window_geometry() {
        let cfg = CdpConfig::default();
        assert_eq!((cfg.window_width, cfg.window_height), (450, 700));
        assert_eq!((cfg.window_left, cfg.window_top), (50, 50));
        assert_eq!(cfg.default_deadline_ms, 30_000);
    }
}
