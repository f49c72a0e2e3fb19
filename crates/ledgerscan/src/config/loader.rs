use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.raster.dpi < 72 || config.raster.dpi > 1200 {
        return Err(ConfigError::Validation {
            message: format!("raster.dpi must be within 72..=1200, got {}", config.raster.dpi),
        });
    }

    if config.raster.max_pages == 0 {
        return Err(ConfigError::Validation {
            message: "raster.maxPages must be at least 1".to_string(),
        });
    }

    if config.raster.render_scale <= 0.0 {
        return Err(ConfigError::Validation {
            message: "raster.renderScale must be positive".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&config.default_vat_rate) {
        return Err(ConfigError::Validation {
            message: format!(
                "defaultVatRate must be a fraction within 0.0..=1.0, got {}",
                config.default_vat_rate
            ),
        });
    }

    if config.ocr.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "ocr.retry.maxAttempts must be at least 1".to_string(),
        });
    }

    Ok(())
}
