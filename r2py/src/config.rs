//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `R2PY_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `R2PY_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `R2PY_COMPLETIONS__MODEL=gpt-3.5-turbo-instruct` sets the `completions.model` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`, `max_upload_size`
//! - **Storage**: `storage.upload_dir`, `storage.output_dir` - the two working directories
//! - **Completions**: `completions.base_url`, `completions.model`, `completions.temperature`,
//!   `completions.max_tokens`, `completions.request_timeout`
//! - **Telemetry**: `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! R2PY_PORT=8080
//! R2PY_STORAGE__OUTPUT_DIR=/var/lib/r2py/python
//! R2PY_COMPLETIONS__REQUEST_TIMEOUT=60s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "R2PY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Maximum accepted request body size in bytes (applies to uploads)
    pub max_upload_size: usize,
    /// Working directories for uploads and generated files
    pub storage: StorageConfig,
    /// The text-completion service used for translation
    pub completions: CompletionsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Holds at most the most recently uploaded R file
    pub upload_dir: PathBuf,
    /// Holds at most the most recently generated Python file
    pub output_dir: PathBuf,
}

/// Settings for the OpenAI-compatible `/completions` endpoint.
///
/// The API key is deliberately absent: it is supplied by the user with every request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionsConfig {
    /// Base URL of the API, `completions` is joined onto it
    pub base_url: Url,
    /// Completion model name
    pub model: String,
    /// Sampling temperature, zero for reproducible output
    pub temperature: f32,
    /// Hard bound on output length; longer translations come back truncated
    pub max_tokens: u32,
    /// Per-request timeout. Unset means the HTTP client default (no timeout).
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_size: 10 * 1024 * 1024,
            storage: StorageConfig::default(),
            completions: CompletionsConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("UPLOAD_FOLDER"),
            output_dir: PathBuf::from("PYTHON_FOLDER"),
        }
    }
}

impl Default for CompletionsConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.openai.com/v1/").expect("static URL is valid"),
            model: "gpt-3.5-turbo-instruct".to_string(),
            temperature: 0.0,
            max_tokens: 1500,
            request_timeout: None,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        if self.completions.max_tokens == 0 {
            return Err(Error::Internal {
                operation: "Config validation: completions.max_tokens must be greater than zero".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.completions.temperature) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: completions.temperature ({}) must be between 0 and 2",
                    self.completions.temperature
                ),
            });
        }

        if self.storage.upload_dir == self.storage.output_dir {
            return Err(Error::Internal {
                operation: "Config validation: storage.upload_dir and storage.output_dir must be different directories".to_string(),
            });
        }

        if self.max_upload_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: max_upload_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // R2PY_CONFIG names the file itself and is not a config field
            .merge(Env::prefixed("R2PY_").split("__").ignore(&["config"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.port, 5000);
            assert_eq!(config.storage.upload_dir, PathBuf::from("UPLOAD_FOLDER"));
            assert_eq!(config.storage.output_dir, PathBuf::from("PYTHON_FOLDER"));
            assert_eq!(config.completions.model, "gpt-3.5-turbo-instruct");
            assert_eq!(config.completions.temperature, 0.0);
            assert_eq!(config.completions.max_tokens, 1500);
            assert!(config.completions.request_timeout.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
storage:
  upload_dir: /tmp/r-in
  output_dir: /tmp/py-out
completions:
  base_url: http://localhost:9000/v1/
  max_tokens: 200
  request_timeout: 30s
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.port, 8080);
            assert_eq!(config.storage.upload_dir, PathBuf::from("/tmp/r-in"));
            assert_eq!(config.completions.base_url.as_str(), "http://localhost:9000/v1/");
            assert_eq!(config.completions.max_tokens, 200);
            assert_eq!(config.completions.request_timeout, Some(Duration::from_secs(30)));
            // untouched nested fields keep defaults
            assert_eq!(config.completions.model, "gpt-3.5-turbo-instruct");

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 8080\n")?;

            jail.set_env("R2PY_HOST", "127.0.0.1");
            jail.set_env("R2PY_PORT", "9090");
            jail.set_env("R2PY_COMPLETIONS__MODEL", "my-model");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 9090);
            assert_eq!(config.completions.model, "my-model");
            assert_eq!(config.bind_address(), "127.0.0.1:9090");

            Ok(())
        });
    }

    #[test]
    fn test_config_path_from_env() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.yaml", "port: 7000\n")?;
            jail.set_env("R2PY_CONFIG", "custom.yaml");

            let args = Args::try_parse_from(["r2py"]).expect("args should parse");
            assert_eq!(args.config, "custom.yaml");

            let config = Config::load(&args)?;
            assert_eq!(config.port, 7000);

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "openai_key: sk-should-not-be-here\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());

            Ok(())
        });
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.completions.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.completions.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.output_dir = config.storage.upload_dir.clone();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_upload_size = 0;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }
}
