//! Service configuration loaded from a TOML file.
//!
//! Every field has a default, so a missing file or a partial file both work.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::predictor::DEFAULT_THRESHOLD;
use crate::registry::ModelLabel;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "EMOTION_CLF_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/emotion_clf.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding the six artifacts.
    pub dir: PathBuf,
    /// Fraction in [0, 1] used when a request omits its own threshold.
    pub default_threshold: f64,
    pub artifacts: ArtifactFiles,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            default_threshold: DEFAULT_THRESHOLD,
            artifacts: ArtifactFiles::default(),
        }
    }
}

impl ModelsConfig {
    pub fn artifact_path(&self, label: ModelLabel) -> PathBuf {
        self.dir.join(self.artifacts.file_for(label))
    }
}

/// Artifact file names, relative to [`ModelsConfig::dir`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactFiles {
    pub japanese: String,
    pub korean: String,
    pub english: String,
    pub filipino: String,
    pub spanish: String,
    pub emoji: String,
}

impl Default for ArtifactFiles {
    fn default() -> Self {
        Self {
            japanese: "japanese.json".to_string(),
            korean: "korean.json".to_string(),
            english: "english.json".to_string(),
            filipino: "filipino.json".to_string(),
            spanish: "spanish.json".to_string(),
            emoji: "emoji.json".to_string(),
        }
    }
}

impl ArtifactFiles {
    pub fn file_for(&self, label: ModelLabel) -> &str {
        match label {
            ModelLabel::Japanese => &self.japanese,
            ModelLabel::Korean => &self.korean,
            ModelLabel::English => &self.english,
            ModelLabel::Filipino => &self.filipino,
            ModelLabel::Spanish => &self.spanish,
            ModelLabel::Emoji => &self.emoji,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=debug".to_string(),
        }
    }
}

impl Config {
    /// Load from `$EMOTION_CLF_CONFIG`, or `config.toml` when it exists.
    /// Falls back to defaults when neither is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.models.default_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "models.default_threshold {threshold} is outside [0, 1]"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.addr(), SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.models.default_threshold, 0.5);
        assert_eq!(
            config.models.artifact_path(ModelLabel::Emoji),
            PathBuf::from("models/emoji.json")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[server]").unwrap();
        writeln!(temp_file, "port = 9000").unwrap();
        writeln!(temp_file, "[models.artifacts]").unwrap();
        writeln!(temp_file, "english = \"emotion_classifier_pipe_lr.json\"").unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(
            config.models.artifacts.file_for(ModelLabel::English),
            "emotion_classifier_pipe_lr.json"
        );
        assert_eq!(config.models.artifacts.file_for(ModelLabel::Korean), "korean.json");
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[models]").unwrap();
        writeln!(temp_file, "default_threshold = 50.0").unwrap();

        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[server").unwrap();

        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
