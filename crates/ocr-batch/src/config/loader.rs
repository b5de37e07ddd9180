use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
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

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    let threshold = config.defaults.accuracy_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Validation {
            message: format!("accuracy_threshold must be within [0, 1], got {}", threshold),
        });
    }

    let ocr = &config.ocr;
    if ocr.attempts == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.attempts must be at least 1".to_string(),
        });
    }
    if ocr.page_timeout_seconds == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.page_timeout_seconds must be greater than 0".to_string(),
        });
    }
    if ocr.page_parallelism == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.page_parallelism must be at least 1".to_string(),
        });
    }
    if ocr.dpi == 0 || ocr.max_image_side == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.dpi and ocr.max_image_side must be greater than 0".to_string(),
        });
    }
    if let Some(lang) = ocr.languages.iter().find(|l| l.trim().is_empty() || l.contains('+')) {
        return Err(ConfigError::Validation {
            message: format!("Invalid OCR language code '{}'", lang),
        });
    }

    Ok(())
}
