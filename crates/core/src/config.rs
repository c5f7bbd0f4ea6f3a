//! Configuration management for qakb.
//!
//! Configuration is merged from three sources, later ones winning:
//! - Defaults
//! - The workspace config file (`.qakb/config.yaml`)
//! - Environment variables and command-line flags
//!
//! The file may carry sections owned by other crates (such as `knowledge:`);
//! those are kept as raw YAML and decoded by their owner through
//! [`AppConfig::section`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".qakb";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .qakb/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Raw `knowledge:` section of the config file
    #[serde(skip)]
    knowledge: Option<serde_yaml::Value>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    logging: Option<LoggingConfig>,
    knowledge: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            knowledge: None,
        }
    }
}

impl AppConfig {
    /// Load configuration for a workspace.
    ///
    /// `workspace` defaults to the current directory and `config_file` to
    /// `<workspace>/.qakb/config.yaml`. A missing default config file is not
    /// an error; a missing explicit one is.
    ///
    /// # Example
    /// ```no_run
    /// use qakb_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if !config.workspace.is_dir() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let explicit = config_file.is_some();
        let config_path = config_file.unwrap_or_else(|| config.default_config_path());

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
            config.config_file = Some(config_path);
        } else if explicit {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|e| {
                AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        self.knowledge = config_file.knowledge;

        tracing::debug!("Merged config file {:?}", path);
        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(mut self, log_level: Option<String>, verbose: bool, no_color: bool) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Decode a named section of the config file.
    ///
    /// Returns `T::default()` when the section is absent.
    pub fn section<T: DeserializeOwned + Default>(&self, name: &str) -> AppResult<T> {
        let raw = match name {
            "knowledge" => self.knowledge.clone(),
            other => {
                return Err(AppError::Config(format!("Unknown config section: {}", other)));
            }
        };

        match raw {
            Some(value) if !value.is_null() => serde_yaml::from_value(value).map_err(|e| {
                AppError::Config(format!("Invalid '{}' configuration: {}", name, e))
            }),
            _ => Ok(T::default()),
        }
    }

    /// Get the path to the .qakb directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Default location of the config file.
    pub fn default_config_path(&self) -> PathBuf {
        self.state_dir().join("config.yaml")
    }

    /// Ensure the .qakb directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Default, Deserialize)]
    struct Section {
        #[serde(default)]
        chunk_size: usize,
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_state_dir() {
        let config = AppConfig::default();
        assert!(config.state_dir().ends_with(".qakb"));
    }

    #[test]
    fn test_with_overrides_verbose_implies_debug() {
        let config = AppConfig::default().with_overrides(None, true, false);
        assert!(config.verbose);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_explicit_log_level_wins_over_verbose() {
        let config = AppConfig::default().with_overrides(Some("warn".to_string()), true, false);
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_workspace() {
        let result = AppConfig::load(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_missing_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("nope.yaml")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_yaml_sections() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(STATE_DIR)).unwrap();
        std::fs::write(
            temp.path().join(STATE_DIR).join("config.yaml"),
            "logging:\n  level: trace\n  color: false\nknowledge:\n  chunk_size: 500\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(temp.path().to_path_buf()), None).unwrap();
        assert!(config.no_color);
        assert!(config.config_file.is_some());

        let section: Section = config.section("knowledge").unwrap();
        assert_eq!(section.chunk_size, 500);
    }

    #[test]
    fn test_absent_section_is_default() {
        let config = AppConfig::default();
        let section: Section = config.section("knowledge").unwrap();
        assert_eq!(section.chunk_size, 0);
    }
}
