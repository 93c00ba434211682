use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        if let Some(pd) = ProjectDirs::from("", "", "cadence") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("cadence_config.json")
        }
    }

    /// Default directory for CSV exports when the config names none
    pub fn export_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("cadence")
                .join("sessions")
        } else {
            ProjectDirs::from("", "", "cadence")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("sessions"))
                .unwrap_or_else(|| PathBuf::from("sessions"))
        }
    }
}
