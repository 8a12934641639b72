use std::convert::Infallible;
use std::f32::consts::TAU;
use std::time::Instant;

use embedded_hal::digital::{ErrorType, InputPin};
use serde::Deserialize;

use telenode::sensor::SensorBank;
use telenode_drivers::pir::Pir;

/// Which simulated sensors are fitted, and how they behave.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorSettings {
    /// Whether a temperature sensor is fitted.
    pub temperature: bool,
    /// Whether a humidity sensor is fitted.
    pub humidity: bool,
    /// Whether a gas sensor is fitted.
    pub gas: bool,
    /// Whether a motion sensor is fitted.
    pub motion: bool,
    /// Mean temperature in degrees Celsius.
    pub base_temperature: f32,
    /// Mean relative humidity as a percentage.
    pub base_humidity: f32,
    /// Mean gas level.
    pub base_gas_level: u16,
    /// Period of the simulated variations, in milliseconds.
    pub period_ms: u64,
    /// Every `n`-th temperature and humidity reading fails, `0` disables
    /// failures.
    pub fail_every: u32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            temperature: true,
            humidity: true,
            gas: true,
            motion: false,
            base_temperature: 22.0,
            base_humidity: 50.0,
            base_gas_level: 120,
            period_ms: 60_000,
            fail_every: 0,
        }
    }
}

/// A motion output pin, low for the first quarter of every period.
#[derive(Debug)]
pub struct SimulatedPirPin {
    started: Instant,
    period_ms: u64,
}

impl SimulatedPirPin {
    fn level_low_at(&self, elapsed_ms: u64) -> bool {
        self.period_ms > 0 && elapsed_ms % self.period_ms < self.period_ms / 4
    }
}

impl ErrorType for SimulatedPirPin {
    type Error = Infallible;
}

impl InputPin for SimulatedPirPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level_low_at(elapsed_ms(self.started)))
    }
}

/// Sensors simulated on a host.
///
/// Climate readings follow a slow sine wave around their mean, the gas level
/// ramps up and down, and motion comes from an active-low [`Pir`].
#[derive(Debug)]
pub struct SimulatedSensors {
    settings: SensorSettings,
    started: Instant,
    pir: Option<Pir<SimulatedPirPin>>,
    temperature_reads: u32,
    humidity_reads: u32,
}

impl SimulatedSensors {
    /// Creates [`SimulatedSensors`] starting now.
    #[must_use]
    pub fn new(settings: SensorSettings) -> Self {
        let started = Instant::now();
        let pir = settings.motion.then(|| {
            Pir::new(SimulatedPirPin {
                started,
                period_ms: settings.period_ms / 4,
            })
        });

        Self {
            settings,
            started,
            pir,
            temperature_reads: 0,
            humidity_reads: 0,
        }
    }

    fn phase(&self, elapsed_ms: u64) -> f32 {
        if self.settings.period_ms == 0 {
            return 0.0;
        }
        let position = (elapsed_ms % self.settings.period_ms) as f32;
        (TAU * position / self.settings.period_ms as f32).sin()
    }

    fn temperature_at(&self, elapsed_ms: u64) -> f32 {
        self.settings.base_temperature + 2.0 * self.phase(elapsed_ms)
    }

    fn humidity_at(&self, elapsed_ms: u64) -> f32 {
        (self.settings.base_humidity - 5.0 * self.phase(elapsed_ms)).clamp(0.0, 100.0)
    }

    fn gas_level_at(&self, elapsed_ms: u64) -> u16 {
        let swing = (20.0 * self.phase(elapsed_ms)) as i32;
        let level = i32::from(self.settings.base_gas_level) + swing;
        u16::try_from(level.max(0)).unwrap_or(u16::MAX)
    }

}

// Counts a read and tells whether it is one of the injected failures.
fn injected_failure(reads: &mut u32, fail_every: u32) -> bool {
    *reads = reads.wrapping_add(1);
    fail_every > 0 && reads.is_multiple_of(fail_every)
}

impl SensorBank for SimulatedSensors {
    fn temperature(&mut self) -> Option<f32> {
        if !self.settings.temperature {
            return None;
        }
        if injected_failure(&mut self.temperature_reads, self.settings.fail_every) {
            return Some(f32::NAN);
        }
        Some(self.temperature_at(elapsed_ms(self.started)))
    }

    fn humidity(&mut self) -> Option<f32> {
        if !self.settings.humidity {
            return None;
        }
        if injected_failure(&mut self.humidity_reads, self.settings.fail_every) {
            return Some(f32::NAN);
        }
        Some(self.humidity_at(elapsed_ms(self.started)))
    }

    fn gas_level(&mut self) -> Option<u16> {
        self.settings
            .gas
            .then(|| self.gas_level_at(elapsed_ms(self.started)))
    }

    fn motion(&mut self) -> Option<bool> {
        let pir = self.pir.as_mut()?;
        match pir.motion_detected() {
            Ok(detected) => Some(detected),
            Err(e) => match e {},
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use telenode::sensor::SensorBank;

    use super::{SensorSettings, SimulatedPirPin, SimulatedSensors};

    #[test]
    fn readings_stay_around_their_mean() {
        let sensors = SimulatedSensors::new(SensorSettings::default());

        for elapsed in (0..120_000).step_by(1_000) {
            let temperature = sensors.temperature_at(elapsed);
            assert!((20.0..=24.0).contains(&temperature));

            let humidity = sensors.humidity_at(elapsed);
            assert!((45.0..=55.0).contains(&humidity));

            let gas = sensors.gas_level_at(elapsed);
            assert!((100..=140).contains(&gas));
        }

        assert!((sensors.temperature_at(0) - 22.0).abs() < 1e-4);
        assert!((sensors.temperature_at(15_000) - 24.0).abs() < 1e-3);
    }

    #[test]
    fn only_fitted_sensors_report() {
        let mut sensors = SimulatedSensors::new(SensorSettings {
            humidity: false,
            gas: false,
            ..SensorSettings::default()
        });

        assert!(sensors.temperature().is_some());
        assert_eq!(sensors.humidity(), None);
        assert_eq!(sensors.gas_level(), None);
        assert_eq!(sensors.motion(), None);
    }

    #[test]
    fn injected_failures() {
        let mut sensors = SimulatedSensors::new(SensorSettings {
            fail_every: 3,
            ..SensorSettings::default()
        });

        let readings: Vec<(bool, bool)> = (0..6)
            .map(|_| {
                (
                    sensors.temperature().is_some_and(f32::is_nan),
                    sensors.humidity().is_some_and(f32::is_nan),
                )
            })
            .collect();

        assert_eq!(
            readings,
            [
                (false, false),
                (false, false),
                (true, true),
                (false, false),
                (false, false),
                (true, true),
            ]
        );
    }

    #[test]
    fn failures_are_disabled_by_default() {
        let mut sensors = SimulatedSensors::new(SensorSettings::default());

        for _ in 0..10 {
            assert!(sensors.temperature().is_some_and(f32::is_finite));
            assert!(sensors.humidity().is_some_and(f32::is_finite));
        }
    }

    #[test]
    fn pir_pin_is_active_low() {
        let pin = SimulatedPirPin {
            started: Instant::now(),
            period_ms: 1_000,
        };

        assert!(pin.level_low_at(0));
        assert!(pin.level_low_at(249));
        assert!(!pin.level_low_at(250));
        assert!(!pin.level_low_at(999));
        assert!(pin.level_low_at(1_000));
    }

    #[test]
    fn motion_sensor_is_fitted_on_demand() {
        let mut sensors = SimulatedSensors::new(SensorSettings {
            motion: true,
            ..SensorSettings::default()
        });

        // The first quarter of the period is a motion window.
        assert_eq!(sensors.motion(), Some(true));
    }
}
