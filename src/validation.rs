use crate::errors::{AppError, Result};
use url::Url;
use std::path::Path;

pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_api_base(&self, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(AppError::Validation("API base URL cannot be empty".to_string()));
        }

        let parsed_url = Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Unsupported scheme: {}. Use http or https",
                parsed_url.scheme()
            )));
        }

        if parsed_url.host_str().is_none() {
            return Err(AppError::Validation("URL must have a host".to_string()));
        }

        Ok(())
    }

    /// Album ids are alphanumeric strings, track and artist ids are numeric.
    pub fn validate_catalog_id(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(AppError::Validation("Catalog id cannot be empty".to_string()));
        }

        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::Validation(format!("Invalid catalog id: {}", id)));
        }

        Ok(())
    }

    pub fn validate_numeric_id(&self, id: &str) -> Result<u64> {
        id.parse::<u64>()
            .map_err(|_| AppError::Validation(format!("Expected a numeric id, got: {}", id)))
    }

    pub fn validate_output_dir(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(AppError::Validation("Output directory cannot be empty".to_string()));
        }

        if path.to_string_lossy().contains('\0') {
            return Err(AppError::Validation("Null bytes not allowed in file path".to_string()));
        }

        if path.exists() && !path.is_dir() {
            return Err(AppError::Validation(format!("{} is not a directory", path.display())));
        }

        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
