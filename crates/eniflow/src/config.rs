//! Reconciler timing and paging configuration

use crate::error::{EniError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest page size the provider accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest accepted wait for any single operation (one day)
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Timing and paging settings for a [`crate::Reconciler`]
///
/// Polling uses a fixed interval: the provider converges within seconds to
/// low minutes, so backing off would only add latency. Timeouts are
/// wall-clock deadlines, not attempt counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds between two probes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Deadline for a new interface to become Available
    #[serde(default = "default_create_timeout")]
    pub create_timeout_secs: u64,
    /// Deadline for a delete to be accepted and the interface to disappear
    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_secs: u64,
    /// Deadline for an attached interface to show up on the instance
    #[serde(default = "default_attach_timeout")]
    pub attach_timeout_secs: u64,
    /// Deadline for a detach to be accepted and the interface to leave the instance
    #[serde(default = "default_detach_timeout")]
    pub detach_timeout_secs: u64,
    /// Entries per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_create_timeout() -> u64 {
    500
}
fn default_delete_timeout() -> u64 {
    300
}
fn default_attach_timeout() -> u64 {
    60
}
fn default_detach_timeout() -> u64 {
    300
}
fn default_page_size() -> u32 {
    50
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            create_timeout_secs: default_create_timeout(),
            delete_timeout_secs: default_delete_timeout(),
            attach_timeout_secs: default_attach_timeout(),
            detach_timeout_secs: default_detach_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl ReconcilerConfig {
    /// Defaults overlaid with `ENIFLOW_*` environment variables
    ///
    /// - `ENIFLOW_POLL_INTERVAL_SECS`
    /// - `ENIFLOW_CREATE_TIMEOUT_SECS`
    /// - `ENIFLOW_DELETE_TIMEOUT_SECS`
    /// - `ENIFLOW_ATTACH_TIMEOUT_SECS`
    /// - `ENIFLOW_DETACH_TIMEOUT_SECS`
    /// - `ENIFLOW_PAGE_SIZE`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_number("ENIFLOW_POLL_INTERVAL_SECS")? {
            config.poll_interval_secs = v;
        }
        if let Some(v) = env_number("ENIFLOW_CREATE_TIMEOUT_SECS")? {
            config.create_timeout_secs = v;
        }
        if let Some(v) = env_number("ENIFLOW_DELETE_TIMEOUT_SECS")? {
            config.delete_timeout_secs = v;
        }
        if let Some(v) = env_number("ENIFLOW_ATTACH_TIMEOUT_SECS")? {
            config.attach_timeout_secs = v;
        }
        if let Some(v) = env_number("ENIFLOW_DETACH_TIMEOUT_SECS")? {
            config.detach_timeout_secs = v;
        }
        if let Some(v) = env_number("ENIFLOW_PAGE_SIZE")? {
            config.page_size = u32::try_from(v).map_err(|_| {
                EniError::InvalidConfig(format!("ENIFLOW_PAGE_SIZE out of range: {}", v))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(EniError::InvalidConfig(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(EniError::InvalidConfig(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        let timeouts = [
            ("create", self.create_timeout_secs),
            ("delete", self.delete_timeout_secs),
            ("attach", self.attach_timeout_secs),
            ("detach", self.detach_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs > MAX_TIMEOUT_SECS {
                return Err(EniError::InvalidConfig(format!(
                    "{} timeout ({}s) exceeds the maximum of {}s",
                    name, secs, MAX_TIMEOUT_SECS
                )));
            }
            if secs < self.poll_interval_secs {
                return Err(EniError::InvalidConfig(format!(
                    "{} timeout ({}s) is shorter than the poll interval ({}s)",
                    name, secs, self.poll_interval_secs
                )));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_secs(self.attach_timeout_secs)
    }

    pub fn detach_timeout(&self) -> Duration {
        Duration::from_secs(self.detach_timeout_secs)
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| EniError::InvalidConfig(format!("{} must be a number, got '{}'", key, value))),
        Err(_) => Ok(None),
    }
}
