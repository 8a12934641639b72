//! # PIR Adapter
//!
//! This module provides an architecture-agnostic adapter for passive
//! infrared motion sensors exposing a single digital output, such as the
//! `HC-SR501` or the `AM312`.
//!
//! The adapter only samples the output level, it never waits for an edge,
//! so a read always returns immediately.
//!
//! Deployed nodes wire the sensor so that a **low** level means motion,
//! which is the default [`ActiveLevel`].

use embedded_hal::digital::InputPin;

/// The output level signalling motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveLevel {
    /// Motion pulls the output low.
    #[default]
    Low,
    /// Motion drives the output high.
    High,
}

/// The PIR adapter.
#[derive(Debug)]
pub struct Pir<P>
where
    P: InputPin,
{
    pin: P,
    active: ActiveLevel,
}

impl<P> Pir<P>
where
    P: InputPin,
{
    /// Creates an active-low [`Pir`] on the given pin.
    #[must_use]
    #[inline]
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            active: ActiveLevel::Low,
        }
    }

    /// Sets the [`ActiveLevel`].
    #[must_use]
    #[inline]
    pub fn active_level(mut self, active: ActiveLevel) -> Self {
        self.active = active;
        self
    }

    /// Whether motion is currently detected.
    ///
    /// # Errors
    ///
    /// The pin level cannot be read.
    pub fn motion_detected(&mut self) -> Result<bool, P::Error> {
        match self.active {
            ActiveLevel::Low => self.pin.is_low(),
            ActiveLevel::High => self.pin.is_high(),
        }
    }

    /// Releases the pin.
    #[must_use]
    #[inline]
    pub fn release(self) -> P {
        self.pin
    }
}
