//! Runtime configuration
//!
//! The configuration store keeps a postcard-encoded [`Config`]. It is read
//! once at boot; nothing in the core writes it back at runtime.

use alloc::vec::Vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::DEFAULT_BUCKET_WIDTH;

pub const ONE_HOUR: u32 = 60 * 60;
pub const ONE_DAY: u32 = ONE_HOUR * 24;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Seconds per session bucket
    pub bucket_width_secs: u32,
    /// Identifier stamped on every session
    pub collector_id: u32,
    /// Seconds after local midnight from which the radio stays on
    pub radio_enable_time: u32,
    /// Rotation log verbosity: 1 logs rotations and timers, 2 logs every turn
    pub debug_level: u8,
    /// Last byte of the advertised host name
    pub module_suffix: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_width_secs: DEFAULT_BUCKET_WIDTH,
            collector_id: 0,
            radio_enable_time: 7 * ONE_HOUR,
            debug_level: 0,
            module_suffix: b'X',
        }
    }
}

impl Config {
    /// Decode and validate a blob from the configuration store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Decode)?;
        config.validate()
    }

    /// Encode for the configuration store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Encode)
    }

    /// Reject values the schedulers cannot work with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.bucket_width_secs == 0 {
            return Err(ConfigError::ZeroBucketWidth);
        }
        if self.radio_enable_time >= ONE_DAY {
            return Err(ConfigError::EnableTimeOutOfRange(self.radio_enable_time));
        }
        if self.bucket_width_secs != DEFAULT_BUCKET_WIDTH {
            warn!(
                "Bucket width is {}s, not the usual {}s",
                self.bucket_width_secs, DEFAULT_BUCKET_WIDTH
            );
        }
        Ok(self)
    }

    /// Print every key, as the boot banner does.
    pub fn log_summary(&self) {
        info!("config bucket_width_secs={}", self.bucket_width_secs);
        info!("config collector_id={}", self.collector_id);
        info!("config radio_enable_time={}", self.radio_enable_time);
        info!("config debug_level={}", self.debug_level);
        info!("config module_suffix={}", self.module_suffix as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(config));
        assert_eq!(config.bucket_width_secs, 900);
        assert_eq!(config.radio_enable_time, 25_200);
    }

    #[test]
    fn config_survives_the_store() {
        let config = Config {
            collector_id: 42,
            debug_level: 2,
            module_suffix: b'Q',
            ..Config::default()
        };
        let bytes = config.to_bytes().unwrap();
        assert_eq!(Config::from_bytes(&bytes), Ok(config));
    }

    #[test]
    fn zero_bucket_width_is_rejected() {
        let config = Config {
            bucket_width_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBucketWidth));
    }

    #[test]
    fn enable_time_past_midnight_is_rejected() {
        let config = Config {
            radio_enable_time: ONE_DAY,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EnableTimeOutOfRange(ONE_DAY)));
    }

    #[test]
    fn truncated_blob_fails_to_decode() {
        let bytes = Config::default().to_bytes().unwrap();
        assert_eq!(Config::from_bytes(&bytes[..1]), Err(ConfigError::Decode));
    }
}
