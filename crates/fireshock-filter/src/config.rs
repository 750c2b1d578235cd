//! Filter configuration.

use std::time::Duration;

use fireshock_hid_dualshock_protocol::DeviceSettings;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, FilterResult};

/// Longest accepted timer period.
const MAX_INTERVAL_MS: u64 = 1000;

/// Timing and default-settings configuration shared by every session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Period of the output report push timer (milliseconds).
    pub output_interval_ms: u64,
    /// Period of the DualShock 3 enable retry timer (milliseconds).
    pub enable_retry_interval_ms: u64,
    /// Timeout for control transfers issued by the filter (milliseconds).
    pub control_timeout_ms: u64,
    /// Added to the enumeration index to form the virtual pad serial.
    pub virtual_pad_serial_offset: u32,
    /// Settings a new session starts with.
    pub default_settings: DeviceSettings,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            output_interval_ms: 10,
            enable_retry_interval_ms: 50,
            control_timeout_ms: 5000,
            virtual_pad_serial_offset: 1,
            default_settings: DeviceSettings::default(),
        }
    }
}

impl FilterConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a timer period is zero or above one second, or if
    /// the control timeout is zero.
    pub fn validate(&self) -> FilterResult<()> {
        if self.output_interval_ms == 0 || self.output_interval_ms > MAX_INTERVAL_MS {
            return Err(FilterError::invalid_configuration(
                "output_interval_ms must be in 1..=1000",
            ));
        }
        if self.enable_retry_interval_ms == 0 || self.enable_retry_interval_ms > MAX_INTERVAL_MS {
            return Err(FilterError::invalid_configuration(
                "enable_retry_interval_ms must be in 1..=1000",
            ));
        }
        if self.control_timeout_ms == 0 {
            return Err(FilterError::invalid_configuration(
                "control_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this structure
    /// or fails [`FilterConfig::validate`].
    pub fn from_json(json: &str) -> FilterResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FilterError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn output_interval(&self) -> Duration {
        Duration::from_millis(self.output_interval_ms)
    }

    pub fn enable_retry_interval(&self) -> Duration {
        Duration::from_millis(self.enable_retry_interval_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }
}

/// Builder for `FilterConfig`.
#[derive(Debug, Default)]
pub struct FilterConfigBuilder {
    config: FilterConfig,
}

impl FilterConfigBuilder {
    #[must_use]
    pub fn output_interval_ms(mut self, ms: u64) -> Self {
        self.config.output_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn enable_retry_interval_ms(mut self, ms: u64) -> Self {
        self.config.enable_retry_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn control_timeout_ms(mut self, ms: u64) -> Self {
        self.config.control_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn virtual_pad_serial_offset(mut self, offset: u32) -> Self {
        self.config.virtual_pad_serial_offset = offset;
        self
    }

    #[must_use]
    pub fn default_settings(mut self, settings: DeviceSettings) -> Self {
        self.config.default_settings = settings;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> FilterResult<FilterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
