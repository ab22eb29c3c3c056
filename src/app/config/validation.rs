use super::{Config, ConfigError};

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings that are accepted but probably not what the user meant.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.quiet && self.verbose {
            warnings.push("--quiet and --verbose both set; --quiet wins".to_string());
        }
        if self.no_mask_secrets && self.enable_api_logging {
            warnings.push("API logging is enabled with secret masking off".to_string());
        }
        warnings
    }
}
