use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::sensor::InvalidReadingPolicy;
use crate::telemetry::EncoderConfig;

// Deployed firmware polls the association 20 times, every 500 ms.
const ASSOCIATION_WINDOW: Duration = Duration::from_millis(20 * 500);
const LINK_BACKOFF_BASE: Duration = Duration::from_secs(1);
const LINK_BACKOFF_MAX: Duration = Duration::from_secs(60);

const SESSION_RETRY_DELAY: Duration = Duration::from_secs(5);
const SESSION_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const PUBLISH_INTERVAL: Duration = Duration::from_secs(5);
const RESTART_THRESHOLD: u32 = 10;

/// Link association policy.
///
/// Every association attempt lasts at most `association_window`. A failed
/// attempt delays the next one with a capped exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPolicy {
    /// Maximum duration of a single association attempt.
    pub association_window: Duration,
    /// Delay after the first failed attempt.
    pub backoff_base: Duration,
    /// Ceiling of the delay between attempts.
    pub backoff_max: Duration,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            association_window: ASSOCIATION_WINDOW,
            backoff_base: LINK_BACKOFF_BASE,
            backoff_max: LINK_BACKOFF_MAX,
        }
    }
}

/// Session connection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Fixed delay imposed after a failed connect attempt.
    pub retry_delay: Duration,
    /// Maximum time a connect attempt may stay unacknowledged.
    pub connect_timeout: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            retry_delay: SESSION_RETRY_DELAY,
            connect_timeout: SESSION_CONNECT_TIMEOUT,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Interval between two telemetry publications.
    pub publish_interval: Duration,
    /// Number of consecutive failed session connects which triggers a
    /// restart.
    pub restart_threshold: u32,
    /// Link association policy.
    pub link: LinkPolicy,
    /// Session connection policy.
    pub session: SessionPolicy,
    /// Telemetry encoding conventions.
    pub encoder: EncoderConfig,
    /// What to report when a sensor returns an invalid reading.
    pub invalid_readings: InvalidReadingPolicy,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            publish_interval: PUBLISH_INTERVAL,
            restart_threshold: RESTART_THRESHOLD,
            link: LinkPolicy::default(),
            session: SessionPolicy::default(),
            encoder: EncoderConfig::default(),
            invalid_readings: InvalidReadingPolicy::default(),
        }
    }
}

impl NodeConfig {
    /// Sets the publish interval.
    #[must_use]
    pub const fn publish_interval(mut self, publish_interval: Duration) -> Self {
        self.publish_interval = publish_interval;
        self
    }

    /// Sets the restart threshold.
    #[must_use]
    pub const fn restart_threshold(mut self, restart_threshold: u32) -> Self {
        self.restart_threshold = restart_threshold;
        self
    }

    /// Sets the [`LinkPolicy`].
    #[must_use]
    pub fn link(mut self, link: LinkPolicy) -> Self {
        self.link = link;
        self
    }

    /// Sets the [`SessionPolicy`].
    #[must_use]
    pub fn session(mut self, session: SessionPolicy) -> Self {
        self.session = session;
        self
    }

    /// Sets the [`EncoderConfig`].
    #[must_use]
    pub const fn encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    /// Sets the [`InvalidReadingPolicy`].
    #[must_use]
    pub const fn invalid_readings(mut self, invalid_readings: InvalidReadingPolicy) -> Self {
        self.invalid_readings = invalid_readings;
        self
    }

    /// Checks the configuration consistency.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Config`] error when:
    /// - The publish interval is zero
    /// - The restart threshold is zero
    /// - The association window is zero
    /// - The link backoff base is greater than its ceiling
    pub fn validate(&self) -> Result<()> {
        if self.publish_interval.is_zero() {
            return Err(config_error("publish interval must be greater than zero"));
        }

        if self.restart_threshold == 0 {
            return Err(config_error("restart threshold must be at least 1"));
        }

        if self.link.association_window.is_zero() {
            return Err(config_error("association window must be greater than zero"));
        }

        if self.link.backoff_base > self.link.backoff_max {
            return Err(config_error(
                "link backoff base must not exceed the backoff ceiling",
            ));
        }

        Ok(())
    }
}

fn config_error(description: &'static str) -> Error {
    Error::new(ErrorKind::Config, description)
}
