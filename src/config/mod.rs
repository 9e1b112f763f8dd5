// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::data::InputField;
use crate::registry::ModelDescriptor;

/// Configuration for the training dataset
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// CSV file the in-memory models are fit on
    pub path: Option<PathBuf>,
    /// Column holding the integer class label
    pub label_column: String,
    /// Feature columns to load, in order. Every column when empty; other
    /// columns may then hold text.
    #[serde(default)]
    pub feature_columns: Vec<String>,
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed of the train/test shuffle
    pub seed: u64,
}

/// Configuration for artifact storage
#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactConfig {
    /// Directory where trained artifacts are written and served from
    pub directory: PathBuf,
}

/// Configuration for fetching remote artifacts
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RemoteConfig {
    /// Request timeout in seconds, no timeout when absent
    pub timeout_secs: Option<u64>,
}

/// Configuration for the artifact server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory
    pub file: Option<PathBuf>,
    /// Write JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Models offered for comparison, in display order
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    /// Dataset-related settings
    pub dataset: DatasetConfig,
    /// Numeric input fields of the prediction form
    #[serde(default)]
    pub inputs: Vec<InputField>,
    /// Artifact-related settings
    pub artifacts: ArtifactConfig,
    /// Remote fetch settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Server-related settings
    pub server: ServerConfig,
    /// Logging-related settings
    pub logging: LoggingConfig,
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Loads settings from `config_dir` in the following order of precedence
    /// (highest to lowest):
    /// 1. Environment variables prefixed with TABPREDICT__ (e.g. TABPREDICT__SERVER__PORT)
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        // Check if config directory exists
        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        // Check if default.toml exists
        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        let local_config = config_dir.join("local.toml");

        let settings = Config::builder()
            .add_source(File::from(default_config))
            .add_source(File::from(local_config).required(false))
            .add_source(
                Environment::with_prefix("TABPREDICT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        // Validate settings after loading
        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        // Create artifact directory if it doesn't exist
        if !self.artifacts.directory.exists() {
            std::fs::create_dir_all(&self.artifacts.directory).map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to create artifact directory at {}: {}",
                    self.artifacts.directory.display(), e
                ))
            })?;
        }

        // Model names are registry keys
        for (i, model) in self.models.iter().enumerate() {
            if model.name.trim().is_empty() {
                return Err(ConfigError::Message(format!("Model #{} has an empty name", i + 1)));
            }
            if self.models[..i].iter().any(|m| m.name == model.name) {
                return Err(ConfigError::Message(
                    format!("Model name '{}' is configured more than once", model.name)
                ));
            }
        }

        // Validate test size range
        if !(self.dataset.test_size > 0.0 && self.dataset.test_size < 1.0) {
            return Err(ConfigError::Message(
                format!("test_size must be between 0.0 and 1.0 (exclusive), got: {}", self.dataset.test_size)
            ));
        }

        if self.dataset.label_column.trim().is_empty() {
            return Err(ConfigError::Message("label_column must not be empty".to_string()));
        }
        if self.dataset.feature_columns.contains(&self.dataset.label_column) {
            return Err(ConfigError::Message(format!(
                "label_column '{}' is also listed in feature_columns", self.dataset.label_column
            )));
        }

        // Validate input field bounds
        for field in &self.inputs {
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    return Err(ConfigError::Message(format!(
                        "Input '{}' has min {} greater than max {}", field.column, min, max
                    )));
                }
            }
            let below = field.min.is_some_and(|min| field.default < min);
            let above = field.max.is_some_and(|max| field.default > max);
            if below || above || !field.default.is_finite() {
                return Err(ConfigError::Message(format!(
                    "Default {} of input '{}' is outside its bounds", field.default, field.column
                )));
            }
        }

        // Validate server port range
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                format!("Port must be between 1 and 65535, got: {}", self.server.port)
            ));
        }

        if self.remote.timeout_secs == Some(0) {
            return Err(ConfigError::Message(
                "remote.timeout_secs must be greater than 0 when set".to_string()
            ));
        }

        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelSource;

    fn write_config(dir: &Path, body: &str) {
        std::fs::write(dir.join("default.toml"), body).unwrap();
    }

    fn base(artifacts: &Path) -> String {
        format!(
            r#"
[dataset]
label_column = "Tumor"
test_size = 0.2
seed = 42

[artifacts]
directory = "{}"

[server]
host = "127.0.0.1"
port = 8080

[logging]
level = "info"
"#,
            artifacts.display()
        )
    }

    #[test]
    fn test_loads_models_and_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join("models");
        let body = format!(
            r#"{}
[[models]]
name = "Random Forest"
source = {{ type = "in_memory", estimator = {{ kind = "random_forest", n_trees = 10 }} }}

[[models]]
name = "LightGBM"
source = {{ type = "local_file", path = "models/lgbm.tabm" }}

[[inputs]]
column = "Torque [Nm]"
min = 0.0
max = 100.0
default = 40.0
"#,
            base(&artifacts)
        );
        write_config(dir.path(), &body);

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.models.len(), 2);
        assert_eq!(settings.models[0].name, "Random Forest");
        assert!(matches!(settings.models[1].source, ModelSource::LocalFile { .. }));
        assert_eq!(settings.inputs[0].column, "Torque [Nm]");
        assert_eq!(settings.inputs[0].offset, 0.0);
        assert!(artifacts.is_dir());
        assert_eq!(settings.remote.timeout_secs, None);
    }

    #[test]
    fn test_rejects_default_outside_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{}\n[[inputs]]\ncolumn = \"Torque [Nm]\"\nmin = 0.0\nmax = 100.0\ndefault = 400.0\n",
            base(&dir.path().join("models"))
        );
        write_config(dir.path(), &body);
        let err = Settings::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("outside its bounds"));
    }

    #[test]
    fn test_rejects_bad_test_size() {
        let dir = tempfile::tempdir().unwrap();
        let body = base(&dir.path().join("models")).replace("test_size = 0.2", "test_size = 1.5");
        write_config(dir.path(), &body);
        assert!(Settings::load(dir.path()).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let err = Settings::load(Path::new("no/such/config")).unwrap_err();
        assert!(err.to_string().contains("Config directory not found"));
    }

    #[test]
    fn test_trained_local_file_and_feature_columns() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            r#"{}
[[models]]
name = "Random Forest"
source = {{ type = "local_file", path = "rf.tabm", estimator = {{ kind = "random_forest" }} }}
"#,
            base(&dir.path().join("models"))
        )
        .replace("seed = 42", "seed = 42\nfeature_columns = [\"Area\"]");
        write_config(dir.path(), &body);

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.dataset.feature_columns, vec!["Area"]);
        assert!(matches!(
            &settings.models[0].source,
            ModelSource::LocalFile { estimator: Some(spec), .. } if spec.kind() == "random_forest"
        ));

        let clash = body.replace("[\"Area\"]", "[\"Area\", \"Tumor\"]");
        write_config(dir.path(), &clash);
        let err = Settings::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("also listed in feature_columns"));
    }
}
