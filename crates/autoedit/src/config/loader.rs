use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads `path` when it exists, otherwise returns the built-in defaults.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.output_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "output_directory must not be empty".to_string(),
        });
    }

    let caption = &config.caption;
    if caption.model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "caption.model must not be empty".to_string(),
        });
    }
    if caption.max_new_tokens == 0 {
        return Err(ConfigError::Validation {
            message: "caption.max_new_tokens must be positive".to_string(),
        });
    }
    if !(0.0..=2.0).contains(&caption.temperature) {
        return Err(ConfigError::Validation {
            message: format!(
                "caption.temperature must be within 0.0..=2.0, got {}",
                caption.temperature
            ),
        });
    }
    if !(caption.top_p > 0.0 && caption.top_p <= 1.0) {
        return Err(ConfigError::Validation {
            message: format!("caption.top_p must be within (0, 1], got {}", caption.top_p),
        });
    }
    validate_endpoint("caption.endpoint", caption.endpoint.as_deref())?;

    let edit = &config.edit;
    if edit.model.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "edit.model must not be empty".to_string(),
        });
    }
    if edit.num_inference_steps == 0 {
        return Err(ConfigError::Validation {
            message: "edit.num_inference_steps must be positive".to_string(),
        });
    }
    if edit.true_cfg_scale <= 0.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "edit.true_cfg_scale must be positive, got {}",
                edit.true_cfg_scale
            ),
        });
    }
    validate_endpoint("edit.endpoint", edit.endpoint.as_deref())?;

    Ok(())
}

fn validate_endpoint(field: &str, endpoint: Option<&str>) -> Result<(), ConfigError> {
    let Some(endpoint) = endpoint else {
        return Ok(());
    };
    let rest = endpoint
        .strip_prefix("http://")
        .or_else(|| endpoint.strip_prefix("https://"));
    match rest {
        Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
        _ => Err(ConfigError::Validation {
            message: format!("{} must be an http(s) URL, got '{}'", field, endpoint),
        }),
    }
}
