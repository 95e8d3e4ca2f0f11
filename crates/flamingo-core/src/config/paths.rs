//! Standard configuration locations

use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "studio.yaml";

/// Per-user configuration directory
///
/// Returns: `~/.config/flamingo` on Linux, the platform equivalent elsewhere
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("flamingo")
}

/// Returns: `<config dir>/flamingo/studio.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}
