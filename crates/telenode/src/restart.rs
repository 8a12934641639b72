use std::fmt;

use log::error;

/// Why a node must restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The session failed to connect this many consecutive times.
    SessionFailures(u32),
    /// A `restart` command arrived on the control channel.
    Command,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionFailures(failures) => {
                write!(f, "{failures} consecutive session connect failures")
            }
            Self::Command => "remote restart command".fmt(f),
        }
    }
}

/// Escalates repeated session connect failures into a restart.
///
/// A restart is unconditional: no state is saved and no graceful shutdown
/// is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    threshold: u32,
}

impl RestartPolicy {
    /// Creates a [`RestartPolicy`] firing at `threshold` consecutive
    /// failures.
    #[must_use]
    pub const fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Returns the failure threshold.
    #[must_use]
    #[inline]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Observes the consecutive failure counter after a failed connect.
    pub fn observe(&self, consecutive_failures: u32) -> Option<RestartReason> {
        (consecutive_failures >= self.threshold).then(|| {
            error!(
                "Session failed {consecutive_failures} times in a row (threshold {}), restarting",
                self.threshold
            );
            RestartReason::SessionFailures(consecutive_failures)
        })
    }
}
