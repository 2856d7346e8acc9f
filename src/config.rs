//! # Configuration
//!
//! Serial device and timing settings, loadable from a JSON file, plus the
//! B-route credentials which are kept out of the file and read from the
//! environment (`BROUTE_ID`, `BROUTE_PASSWORD`) or the command line.

use crate::constants::*;
use crate::error::BrouteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const ENV_BROUTE_ID: &str = "BROUTE_ID";
pub const ENV_BROUTE_PASSWORD: &str = "BROUTE_PASSWORD";

/// Serial and timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrouteConfig {
    /// Serial device of the radio module, e.g. `/dev/ttyUSB0`
    pub device: String,
    pub baudrate: u32,
    /// Active scan attempts before giving up
    pub scan_retries: u32,
    /// `SKSCAN` duration exponent
    pub scan_duration: u8,
    pub scan_retry_delay_secs: u64,
    pub transmit_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for BrouteConfig {
    fn default() -> Self {
        BrouteConfig {
            device: String::new(),
            baudrate: DEFAULT_BAUDRATE,
            scan_retries: DEFAULT_SCAN_RETRIES,
            scan_duration: DEFAULT_SCAN_DURATION,
            scan_retry_delay_secs: DEFAULT_SCAN_RETRY_DELAY_SECS,
            transmit_interval_secs: DEFAULT_TRANSMIT_INTERVAL_SECS,
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

impl BrouteConfig {
    /// Load from a JSON file; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BrouteError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BrouteError::ConfigError(format!("{}: {e}", path.display())))?;
        let config: BrouteConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BrouteError> {
        if self.device.trim().is_empty() {
            return Err(BrouteError::ConfigError("serial device is not set".into()));
        }
        if self.baudrate == 0 {
            return Err(BrouteError::ConfigError("baud rate must be positive".into()));
        }
        if self.scan_retries == 0 {
            return Err(BrouteError::ConfigError("scan_retries must be at least 1".into()));
        }
        Ok(())
    }

    pub fn scan_retry_delay(&self) -> Duration {
        Duration::from_secs(self.scan_retry_delay_secs)
    }

    pub fn transmit_interval(&self) -> Duration {
        Duration::from_secs(self.transmit_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// B-route authentication ID and password. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    id: String,
    password: String,
}

impl Credentials {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Result<Self, BrouteError> {
        let credentials = Credentials {
            id: id.into().trim().to_string(),
            password: password.into().trim().to_string(),
        };
        if credentials.id.is_empty() {
            return Err(BrouteError::ConfigError("B-route ID is empty".into()));
        }
        if credentials.password.is_empty() {
            return Err(BrouteError::ConfigError("B-route password is empty".into()));
        }
        Ok(credentials)
    }

    /// Read `BROUTE_ID` and `BROUTE_PASSWORD`.
    pub fn from_env() -> Result<Self, BrouteError> {
        let read = |name: &str| {
            std::env::var(name).map_err(|_| BrouteError::ConfigError(format!("{name} is not set")))
        };
        Credentials::new(read(ENV_BROUTE_ID)?, read(ENV_BROUTE_PASSWORD)?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("password", &"********")
            .finish()
    }
}
