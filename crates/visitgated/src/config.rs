use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use visitgate_core::Thresholds;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid threshold {name}={value}: must be a finite non-negative number")]
    Threshold { name: &'static str, value: f32 },
}

/// Daemon configuration.
///
/// Built from defaults, then an optional TOML file named by
/// `VISITGATE_CONFIG`, then `VISITGATE_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Acceptance thresholds handed to the verification engine.
    pub thresholds: Thresholds,
    /// Required face descriptor length for registration.
    pub face_descriptor_len: usize,
    /// Serve on the system bus instead of the session bus.
    pub system_bus: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_data_dir().join("visitors.db"),
            thresholds: Thresholds::default(),
            face_descriptor_len: 128,
            system_bus: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("VISITGATE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("VISITGATE_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        self.thresholds.face = env_f32("VISITGATE_FACE_THRESHOLD", self.thresholds.face);
        self.thresholds.fingerprint =
            env_f32("VISITGATE_FINGERPRINT_THRESHOLD", self.thresholds.fingerprint);
        self.face_descriptor_len = env_usize("VISITGATE_FACE_DESCRIPTOR_LEN", self.face_descriptor_len);
        self.system_bus = std::env::var("VISITGATE_SYSTEM_BUS")
            .map(|v| v != "0")
            .unwrap_or(self.system_bus);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |name: &'static str, value: f32| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Threshold { name, value })
            }
        };
        check("face", self.thresholds.face)?;
        check("fingerprint", self.thresholds.fingerprint)
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("visitgate")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.face_descriptor_len, 128);
        assert!(config.db_path.ends_with("visitgate/visitors.db"));
    }

    #[test]
    fn test_toml_overrides_partial() {
        let config = Config::from_toml(
            r#"
            db_path = "/var/lib/visitgate/gate.db"

            [thresholds]
            face = 0.45
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/visitgate/gate.db"));
        assert_eq!(config.thresholds.face, 0.45);
        assert_eq!(config.thresholds.fingerprint, 0.7);
        assert!(!config.system_bus);
    }

    #[test]
    fn test_toml_rejects_bad_types() {
        assert!(matches!(
            Config::from_toml("system_bus = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut config = Config::default();
        config.thresholds.face = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Threshold { name: "face", .. })
        ));
    }

    #[test]
    fn test_env_helpers_fall_back() {
        assert_eq!(env_f32("VISITGATE_TEST_UNSET_F32", 0.6), 0.6);
        std::env::set_var("VISITGATE_TEST_BAD_USIZE", "many");
        assert_eq!(env_usize("VISITGATE_TEST_BAD_USIZE", 128), 128);
        std::env::set_var("VISITGATE_TEST_F32", "0.55");
        assert_eq!(env_f32("VISITGATE_TEST_F32", 0.6), 0.55);
    }
}
