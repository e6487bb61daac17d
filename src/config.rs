//! Service settings for xiaoai-relay.
//!
//! Loads settings from a YAML file in standard locations. Every field has a
//! default, so a missing or partial file still yields a usable config.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SETTINGS_FILE_NAME: &str = "xiaoai-relay.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            open_browser: true,
        }
    }
}

/// Speaker identity and MIoT action ids.
///
/// The defaults target the "Mi AI Speaker Play Plus" (L05C), where
/// `play-text` is service 5 action 3 and `execute-text-directive` is
/// service 5 action 4.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub api_base: String,
    /// Auth file written by the vendor login tool. Empty = `~/.config/mijia-api/auth.json`.
    pub auth_path: String,
    pub siid: u32,
    pub play_text_aiid: u32,
    pub directive_aiid: u32,
    /// Pause after each action, giving the speaker time to pick it up.
    pub sleep_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Mi AI Speaker Play Plus".into(),
            api_base: "https://api.io.mi.com/app".into(),
            auth_path: String::new(),
            siid: 5,
            play_text_aiid: 3,
            directive_aiid: 4,
            sleep_ms: 1000,
            request_timeout_secs: 10,
        }
    }
}

impl DeviceConfig {
    pub fn auth_file(&self) -> PathBuf {
        if self.auth_path.is_empty() {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config/mijia-api/auth.json")
        } else {
            PathBuf::from(&self.auth_path)
        }
    }
}

/// File locations. Empty strings resolve next to the running executable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub assets_dir: String,
    pub config_file: String,
}

impl PathsConfig {
    /// Persisted front-end config blob.
    pub fn config_file(&self) -> PathBuf {
        if self.config_file.is_empty() {
            exe_dir().join("config.json")
        } else {
            PathBuf::from(&self.config_file)
        }
    }

    /// Root of the bundled static front end.
    pub fn assets_dir(&self) -> PathBuf {
        if self.assets_dir.is_empty() {
            exe_dir().join("web")
        } else {
            PathBuf::from(&self.assets_dir)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub paths: PathsConfig,
}

impl Settings {
    /// Load settings from YAML.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./xiaoai-relay.yaml
    /// 2. <exe dir>/xiaoai-relay.yaml
    /// 3. ~/.config/xiaoai-relay/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join(SETTINGS_FILE_NAME)),
                Some(exe_dir().join(SETTINGS_FILE_NAME)),
                dirs::home_dir().map(|h| h.join(".config/xiaoai-relay/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(settings_path) = resolved else {
            info!("No settings file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&settings_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(settings) => {
                    info!("Loaded settings from {}", settings_path.display());
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse {}: {e}, using defaults", settings_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", settings_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

/// Directory holding the running executable, falling back to the cwd.
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_speaker_and_port() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.device.name, "Mi AI Speaker Play Plus");
        assert_eq!(settings.device.siid, 5);
        assert_eq!(settings.device.play_text_aiid, 3);
        assert_eq!(settings.device.directive_aiid, 4);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "server:\n  port: 9000\ndevice:\n  name: Bedroom Speaker\n";
        let settings = Settings::from_yaml(yaml).expect("yaml");
        assert_eq!(settings.server.port, 9000);
        assert!(settings.server.open_browser);
        assert_eq!(settings.device.name, "Bedroom Speaker");
        assert_eq!(settings.device.sleep_ms, 1000);
    }

    #[test]
    fn explicit_paths_are_used_verbatim() {
        let paths = PathsConfig {
            assets_dir: "/srv/relay/web".into(),
            config_file: "/srv/relay/config.json".into(),
        };
        assert_eq!(paths.assets_dir(), PathBuf::from("/srv/relay/web"));
        assert_eq!(paths.config_file(), PathBuf::from("/srv/relay/config.json"));
    }

    #[test]
    fn empty_paths_resolve_next_to_executable() {
        let paths = PathsConfig::default();
        assert_eq!(paths.config_file(), exe_dir().join("config.json"));
        assert_eq!(paths.assets_dir(), exe_dir().join("web"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(Some(&dir.path().join("absent.yaml")));
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "server: [not, a, map").expect("write");
        let settings = Settings::load(Some(&path));
        assert_eq!(settings.server.port, 8080);
    }
}
