use std::fmt;

use log::{debug, info, warn};

use crate::backoff::{Backoff, duration_ms};
use crate::config::LinkPolicy;
use crate::device::Credentials;

/// Link status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not associated.
    #[default]
    Disconnected,
    /// Associated with the local network.
    Connected,
}

/// Link state.
///
/// Only the [`LinkManager`] mutates it, every other component reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    /// Link status.
    pub status: LinkStatus,
    /// Received signal strength, in dBm.
    pub signal_strength: i32,
}

/// The network interface of a node.
///
/// Every method must return immediately: association progresses in the
/// background of the radio and is observed through
/// [`LinkDriver::is_associated`].
pub trait LinkDriver {
    /// Error returned when an association cannot be started.
    type Error: fmt::Display;

    /// Starts associating with the network described by `credentials`.
    ///
    /// # Errors
    ///
    /// The radio refuses to start the association.
    fn associate(&mut self, credentials: &Credentials) -> Result<(), Self::Error>;

    /// Whether the node is currently associated.
    fn is_associated(&mut self) -> bool;

    /// Current received signal strength, in dBm.
    fn signal_strength(&mut self) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    // Waiting until `retry_at` before starting a new association.
    Idle { retry_at: u64 },
    // An association is in progress and gives up at `deadline`.
    Associating { deadline: u64 },
}

/// Owns the association of the node with its local network.
///
/// Association is bounded: an attempt lasts at most the association window
/// of the [`LinkPolicy`], then the next attempt is delayed with a capped
/// exponential backoff. The manager never blocks, it must be polled through
/// [`LinkManager::ensure_connected`] on every tick.
#[derive(Debug)]
pub struct LinkManager<D: LinkDriver> {
    driver: D,
    state: LinkState,
    attempt: Attempt,
    window_ms: u64,
    backoff: Backoff,
}

impl<D: LinkDriver> LinkManager<D> {
    /// Creates a [`LinkManager`] for the given driver.
    #[must_use]
    pub fn new(driver: D, policy: &LinkPolicy) -> Self {
        Self {
            driver,
            state: LinkState::default(),
            attempt: Attempt::Idle { retry_at: 0 },
            window_ms: duration_ms(policy.association_window),
            backoff: Backoff::new(policy.backoff_base, policy.backoff_max),
        }
    }

    /// Returns the current [`LinkState`].
    #[must_use]
    #[inline]
    pub const fn state(&self) -> &LinkState {
        &self.state
    }

    /// Returns the driver.
    #[must_use]
    #[inline]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Returns the driver mutably.
    #[must_use]
    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Keeps the link associated.
    ///
    /// When the link is already up this only refreshes the signal strength.
    /// Otherwise it starts, follows or retries an association attempt,
    /// according to the backoff timer.
    pub fn ensure_connected(&mut self, credentials: &Credentials, now_ms: u64) -> LinkStatus {
        let associated = self.driver.is_associated();
        self.state.signal_strength = self.driver.signal_strength();

        if associated {
            if self.state.status == LinkStatus::Disconnected {
                info!(
                    "Link associated with `{}` (rssi {} dBm)",
                    credentials.ssid, self.state.signal_strength
                );
                self.backoff.reset();
            }
            self.state.status = LinkStatus::Connected;
            self.attempt = Attempt::Idle { retry_at: 0 };
            return LinkStatus::Connected;
        }

        if self.state.status == LinkStatus::Connected {
            warn!("Link with `{}` lost", credentials.ssid);
            self.state.status = LinkStatus::Disconnected;
            self.attempt = Attempt::Idle { retry_at: now_ms };
        }

        match self.attempt {
            Attempt::Idle { retry_at } if now_ms >= retry_at => {
                debug!("Associating with `{}`", credentials.ssid);
                match self.driver.associate(credentials) {
                    Ok(()) => {
                        self.attempt = Attempt::Associating {
                            deadline: now_ms.saturating_add(self.window_ms),
                        };
                    }
                    Err(e) => self.fail(now_ms, &e),
                }
            }
            Attempt::Associating { deadline } if now_ms >= deadline => {
                self.fail(now_ms, &"association window elapsed");
            }
            _ => {}
        }

        LinkStatus::Disconnected
    }

    fn fail(&mut self, now_ms: u64, reason: &dyn fmt::Display) {
        let delay = self.backoff.next_delay();
        warn!(
            "Link association failed ({reason}), attempt {}; retrying in {delay} ms",
            self.backoff.attempts()
        );
        self.attempt = Attempt::Idle {
            retry_at: now_ms.saturating_add(delay),
        };
    }
}
