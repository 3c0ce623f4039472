use crate::detect_chrome_executable;
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};

/// Configuration for launching the browser that hosts worker surfaces.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub default_deadline_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
    pub window_left: u32,
    pub window_top: u32,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: default_chrome_path(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            default_deadline_ms: 30_000,
            window_width: 450,
            window_height: 700,
            window_left: 50,
            window_top: 50,
        }
    }
}

fn resolve_headless_default() -> bool {
    // Headful unless explicitly requested.
    match env::var("DMSWEEP_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            matches!(lower.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => false,
    }
}

fn default_chrome_path() -> PathBuf {
    detect_chrome_executable().unwrap_or_default()
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("DMSWEEP_CHROME_PROFILE") {
        return PathBuf::from(path);
    }

    let default = Path::new("./.dmsweep-profile");
    default.into()
}
