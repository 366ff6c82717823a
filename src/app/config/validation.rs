use super::{Config, ConfigError};
use std::time::Duration;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Origin is the only required flag
        match self.origin.as_deref() {
            Some(origin) if !origin.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingField("origin")),
        }

        if let Some(source_id) = &self.source_id
            && source_id.trim().is_empty()
        {
            return Err(ConfigError::InvalidField {
                field: "source-id",
                reason: "must not be empty".to_string(),
            });
        }

        if self.metrics_cmd.trim().is_empty() {
            return Err(ConfigError::MissingField("metrics-cmd"));
        }

        if self.metrics_interval == Duration::ZERO {
            return Err(ConfigError::InvalidField {
                field: "metrics-interval",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.metrics_cmd_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidField {
                field: "metrics-cmd-timeout",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
