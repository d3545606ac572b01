//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; missing values take the
//! defaults below, which reproduce the encoding the vehicle UI expects.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{DEFAULT_CHANNEL, METHOD_JOYSTICK_DATA};
use crate::command::state::THROTTLE_MAX;
use crate::controller::calibration::{AxisEncoder, DEFAULT_HAT_THRESHOLD, DEFAULT_TURN_CENTER_BAND};
use crate::controller::evdev_source::AxisLayout;
use crate::error::{BridgeError, Result};
use crate::publish::{DEFAULT_LOG_INTERVAL, DEFAULT_PUBLISH_INTERVAL_MS};
use crate::session::evdev_host::DEFAULT_INPUT_DIR;
use crate::session::DeviceFilter;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Publish loop configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PublishConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Outbound method carrying the command record
    #[serde(default = "default_method")]
    pub method: String,

    /// Capacity of the outbound queue shared with method replies
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Publishes between status log messages
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
}

/// Controller encoding configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ControllerConfig {
    #[serde(default)]
    pub layout: AxisLayout,

    #[serde(default = "default_turn_center_band")]
    pub turn_center_band: f64,

    #[serde(default = "default_trigger_max")]
    pub trigger_max: u8,

    #[serde(default = "default_hat_threshold")]
    pub hat_threshold: f32,

    /// Dead-zone for axes whose device reports no `flat` value
    #[serde(default = "default_fallback_deadzone")]
    pub fallback_deadzone: f32,
}

/// Device session configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Hot-plug rescan period
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    #[serde(default)]
    pub vendor_id: Option<u16>,

    #[serde(default)]
    pub product_id: Option<u16>,
}

/// Method-call bridge configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BridgeConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
}

// Default value functions
fn default_interval_ms() -> u64 { DEFAULT_PUBLISH_INTERVAL_MS }
fn default_method() -> String { METHOD_JOYSTICK_DATA.to_string() }
fn default_queue_capacity() -> usize { 64 }
fn default_log_interval() -> u64 { DEFAULT_LOG_INTERVAL }

fn default_turn_center_band() -> f64 { DEFAULT_TURN_CENTER_BAND }
fn default_trigger_max() -> u8 { THROTTLE_MAX }
fn default_hat_threshold() -> f32 { DEFAULT_HAT_THRESHOLD }
fn default_fallback_deadzone() -> f32 { 0.05 }

fn default_input_dir() -> PathBuf { PathBuf::from(DEFAULT_INPUT_DIR) }
fn default_scan_interval_ms() -> u64 { 1000 }

fn default_channel() -> String { DEFAULT_CHANNEL.to_string() }

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            method: default_method(),
            queue_capacity: default_queue_capacity(),
            log_interval: default_log_interval(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            layout: AxisLayout::default(),
            turn_center_band: default_turn_center_band(),
            trigger_max: default_trigger_max(),
            hat_threshold: default_hat_threshold(),
            fallback_deadzone: default_fallback_deadzone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            scan_interval_ms: default_scan_interval_ms(),
            vendor_id: None,
            product_id: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
        }
    }
}

impl PublishConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ControllerConfig {
    /// Encoder built from the configured thresholds
    pub fn encoder(&self) -> AxisEncoder {
        AxisEncoder::new(self.turn_center_band, self.trigger_max, self.hat_threshold)
    }
}

impl SessionConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn filter(&self) -> DeviceFilter {
        DeviceFilter {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Config` if parsing or validation fails.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Publish loop
        if self.publish.interval_ms == 0 || self.publish.interval_ms > 10000 {
            return Err(invalid("interval_ms must be between 1 and 10000"));
        }

        if self.publish.method.is_empty() {
            return Err(invalid("publish method cannot be empty"));
        }

        if self.publish.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be greater than 0"));
        }

        if self.publish.log_interval == 0 {
            return Err(invalid("log_interval must be greater than 0"));
        }

        // Controller thresholds
        let band = self.controller.turn_center_band;
        if !(band > 0.0 && band <= 1.0) {
            return Err(invalid("turn_center_band must be greater than 0.0 and at most 1.0"));
        }

        if self.controller.trigger_max == 0 || self.controller.trigger_max > THROTTLE_MAX {
            return Err(invalid(format!("trigger_max must be between 1 and {}", THROTTLE_MAX)));
        }

        if !(self.controller.hat_threshold > 0.0 && self.controller.hat_threshold <= 1.0) {
            return Err(invalid("hat_threshold must be greater than 0.0 and at most 1.0"));
        }

        if !(0.0..=0.5).contains(&self.controller.fallback_deadzone) {
            return Err(invalid("fallback_deadzone must be between 0.0 and 0.5"));
        }

        // Session
        if self.session.input_dir.as_os_str().is_empty() {
            return Err(invalid("input_dir cannot be empty"));
        }

        if self.session.scan_interval_ms == 0 || self.session.scan_interval_ms > 60000 {
            return Err(invalid("scan_interval_ms must be between 1 and 60000"));
        }

        if self.session.product_id.is_some() && self.session.vendor_id.is_none() {
            return Err(invalid("product_id requires vendor_id"));
        }

        // Bridge
        if self.bridge.channel.is_empty() {
            return Err(invalid("bridge channel cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.publish.interval(), Duration::from_millis(100));
        assert_eq!(config.bridge.channel, "com.rccardt.rccar/usb_joystick");
        assert_eq!(config.controller.encoder(), AxisEncoder::default());
        assert_eq!(config.session.filter(), DeviceFilter::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[publish]
interval_ms = 50

[controller]
layout = "generic"
trigger_max = 60

[session]
input_dir = "/tmp/input"
vendor_id = 0x054c
product_id = 0x0ce6

[bridge]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.publish.interval_ms, 50);
        assert_eq!(config.publish.method, "onJoystickData");
        assert_eq!(config.controller.layout, AxisLayout::Generic);
        assert_eq!(config.controller.trigger_max, 60);
        assert_eq!(config.controller.hat_threshold, 0.5);
        assert_eq!(config.session.input_dir, PathBuf::from("/tmp/input"));
        assert_eq!(config.session.vendor_id, Some(0x054c));
        assert_eq!(config.session.product_id, Some(0x0ce6));
        assert_eq!(config.bridge.channel, DEFAULT_CHANNEL);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/joystick-bridge.toml");
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::parse("[publish\ninterval_ms = ");
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_driver_names_select_standard_layout() {
        for name in ["standard", "dualsense", "xbox"] {
            let config = Config::parse(&format!("[controller]\nlayout = \"{}\"\n", name)).unwrap();
            assert_eq!(config.controller.layout, AxisLayout::Standard, "layout {}", name);
        }
    }

    #[test]
    fn test_unknown_layout() {
        assert!(Config::parse("[controller]\nlayout = \"gamecube\"\n").is_err());
    }

    #[test]
    fn test_interval_zero() {
        let mut config = create_valid_config();
        config.publish.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_long() {
        let mut config = create_valid_config();
        config.publish.interval_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_method() {
        let mut config = create_valid_config();
        config.publish.method = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_queue_capacity_zero() {
        let mut config = create_valid_config();
        config.publish.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_turn_center_band_out_of_range() {
        let mut config = create_valid_config();
        config.controller.turn_center_band = 1.5;
        assert!(config.validate().is_err());

        config.controller.turn_center_band = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_turn_center_band_rejected() {
        let err = Config::parse("[controller]\nturn_center_band = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("turn_center_band"));

        let config = Config::parse("[controller]\nturn_center_band = 1.0\n").unwrap();
        assert_eq!(config.controller.turn_center_band, 1.0);
    }

    #[test]
    fn test_trigger_max_out_of_range() {
        let mut config = create_valid_config();
        config.controller.trigger_max = 91;
        assert!(config.validate().is_err());

        config.controller.trigger_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hat_threshold_out_of_range() {
        let mut config = create_valid_config();
        config.controller.hat_threshold = 0.0;
        assert!(config.validate().is_err());

        config.controller.hat_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fallback_deadzone_out_of_range() {
        let mut config = create_valid_config();
        config.controller.fallback_deadzone = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_interval_zero() {
        let mut config = create_valid_config();
        config.session.scan_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_product_without_vendor() {
        let mut config = create_valid_config();
        config.session.product_id = Some(0x0ce6);
        assert!(config.validate().is_err());

        config.session.vendor_id = Some(0x054c);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_channel() {
        let mut config = create_valid_config();
        config.bridge.channel = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_interval_ms(), 100);
        assert_eq!(default_method(), "onJoystickData");
        assert_eq!(default_queue_capacity(), 64);
        assert_eq!(default_log_interval(), 100);
        assert_eq!(default_turn_center_band(), 0.1);
        assert_eq!(default_trigger_max(), 90);
        assert_eq!(default_hat_threshold(), 0.5);
        assert_eq!(default_fallback_deadzone(), 0.05);
        assert_eq!(default_input_dir(), PathBuf::from("/dev/input"));
        assert_eq!(default_scan_interval_ms(), 1000);
        assert_eq!(default_channel(), "com.rccardt.rccar/usb_joystick");
    }
}
