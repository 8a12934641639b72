use log::{debug, warn};

/// The sensors fitted on a node.
///
/// Each method returns `None` when the node has no such sensor. A fitted
/// sensor which fails to produce a value reports it as `f32::NAN`; the
/// [`Sampler`] takes care of the substitution.
///
/// Implementations must return promptly: the engine is cooperative and a
/// blocking read stalls the whole node.
pub trait SensorBank {
    /// Reads the temperature in degrees Celsius.
    fn temperature(&mut self) -> Option<f32> {
        None
    }

    /// Reads the relative humidity as a percentage.
    fn humidity(&mut self) -> Option<f32> {
        None
    }

    /// Reads the raw gas sensor level.
    fn gas_level(&mut self) -> Option<u16> {
        None
    }

    /// Reads whether motion is detected.
    fn motion(&mut self) -> Option<bool> {
        None
    }
}

/// A snapshot of all sensors, taken for a single publication.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Temperature in degrees Celsius.
    pub temperature: Option<f32>,
    /// Relative humidity as a percentage.
    pub humidity: Option<f32>,
    /// Raw gas sensor level.
    pub gas_level: Option<u16>,
    /// Motion detection.
    pub motion: Option<bool>,
    /// Monotonic milliseconds since boot at sampling time.
    pub sampled_at: u64,
}

/// What to report in place of an invalid reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidReadingPolicy {
    /// Report zero.
    #[default]
    ZeroFill,
    /// Report the last valid reading, or zero if there is none yet.
    LastKnownGood,
}

/// Replaces a not-a-number reading with zero.
///
/// Invalid readings are never surfaced as errors: the node silently
/// publishes zero instead.
#[inline]
#[must_use]
pub fn zero_fill(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value }
}

/// Reads the sensors and produces [`SensorSample`]s.
#[derive(Debug, Default)]
pub struct Sampler {
    policy: InvalidReadingPolicy,
    last_temperature: Option<f32>,
    last_humidity: Option<f32>,
}

impl Sampler {
    /// Creates a [`Sampler`] with the given [`InvalidReadingPolicy`].
    #[must_use]
    pub const fn new(policy: InvalidReadingPolicy) -> Self {
        Self {
            policy,
            last_temperature: None,
            last_humidity: None,
        }
    }

    /// Takes a [`SensorSample`] stamped with `now_ms`.
    pub fn read<S: SensorBank>(&mut self, sensors: &mut S, now_ms: u64) -> SensorSample {
        let temperature = sensors.temperature().map(|value| {
            Self::substitute(self.policy, "temperature", value, &mut self.last_temperature)
        });
        let humidity = sensors
            .humidity()
            .map(|value| Self::substitute(self.policy, "humidity", value, &mut self.last_humidity));

        let sample = SensorSample {
            temperature,
            humidity,
            gas_level: sensors.gas_level(),
            motion: sensors.motion(),
            sampled_at: now_ms,
        };
        debug!("Sampled {sample:?}");

        sample
    }

    fn substitute(
        policy: InvalidReadingPolicy,
        name: &str,
        value: f32,
        last: &mut Option<f32>,
    ) -> f32 {
        if !value.is_nan() {
            *last = Some(value);
            return value;
        }

        warn!("Invalid {name} reading, substituting it");

        match policy {
            InvalidReadingPolicy::ZeroFill => zero_fill(value),
            InvalidReadingPolicy::LastKnownGood => last.unwrap_or_else(|| zero_fill(value)),
        }
    }
}
