//! Default paths for rollcall components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/rollcall/config.toml` or `~/.config/rollcall/config.toml`
//! - Data: `$XDG_DATA_HOME/rollcall` or `~/.local/share/rollcall`

use std::path::PathBuf;

/// Application subdirectory name
const APP_DIR: &str = "rollcall";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Ledger database filename within the data directory
pub const LEDGER_FILENAME: &str = "ledger.db";

fn xdg_dir(var: &str, home_fallback: &[&str], last_resort: &str) -> PathBuf {
    if let Ok(dir) = std::env::var(var) {
        return PathBuf::from(dir).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        let mut path = PathBuf::from(home);
        path.extend(home_fallback);
        return path.join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join(last_resort)
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"], "config").join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// `ROLLCALL_DATA_DIR` is not consulted here; rollcalld reads it as a
/// command-line override on top of the config value.
pub fn default_data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"], "data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_contains_rollcall() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("rollcall"));
        assert!(path.ends_with(CONFIG_FILENAME));
    }

    #[test]
    fn data_dir_contains_rollcall() {
        let path = default_data_dir();
        assert!(path.to_string_lossy().contains("rollcall"));
    }
}
