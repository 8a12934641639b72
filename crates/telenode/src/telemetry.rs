use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

use crate::device::DeviceIdentity;
use crate::error::Result;
use crate::link::LinkState;
use crate::sensor::SensorSample;

// Active-low PIR levels, as read from the motion input pin.
const PIR_MOTION: u8 = 0;
const PIR_IDLE: u8 = 1;

/// How motion is reported in a telemetry message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MotionField {
    /// `pir_motion`: the raw active-low level, `0` when motion is detected
    /// and `1` otherwise.
    #[default]
    PirMotion,
    /// `motion_detected`: a boolean.
    MotionDetected,
}

/// The key carrying the node monotonic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockField {
    /// `uptime`.
    #[default]
    Uptime,
    /// `timestamp`.
    Timestamp,
}

/// How a sensor which is not fitted on the node is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AbsentFields {
    /// The field is left out of the message.
    #[default]
    Omit,
    /// The field is sent as zero. A missing motion sensor is sent as its
    /// idle value.
    Zero,
}

/// Telemetry encoding conventions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Motion key and representation.
    pub motion: MotionField,
    /// Clock key.
    pub clock: ClockField,
    /// Absent sensors representation.
    pub absent: AbsentFields,
}

/// An encoded telemetry message.
///
/// The payload is a flat JSON object whose keys always appear in this
/// order: `device_id`, `location`, `temperature`, `humidity`, `gas_level`,
/// `pir_motion` or `motion_detected`, `rssi`, `uptime` or `timestamp`.
/// Every floating-point value has exactly two decimals.
///
/// The clock value is the node monotonic counter, in milliseconds since
/// boot. It is **not** wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage(String);

impl TelemetryMessage {
    /// Returns the message as a [`&str`].
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the message bytes.
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

#[derive(Serialize)]
struct Wire<'a> {
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    humidity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_level: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pir_motion: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    motion_detected: Option<bool>,
    rssi: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    uptime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
}

// Compact JSON with every float written with two decimals.
struct TwoDecimals;

impl Formatter for TwoDecimals {
    #[inline]
    fn write_f32<W>(&mut self, writer: &mut W, value: f32) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        write!(writer, "{value:.2}")
    }

    #[inline]
    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        write!(writer, "{value:.2}")
    }
}

/// The telemetry encoder.
///
/// Encoding is deterministic: identical inputs always produce
/// byte-identical messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Creates an [`Encoder`] with the given conventions.
    #[must_use]
    pub const fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Encodes a [`SensorSample`] together with the node identity and the
    /// link diagnostics.
    ///
    /// # Errors
    ///
    /// Serializing into memory does not fail for this message layout, the
    /// error is only propagated from the underlying serializer.
    pub fn encode(
        &self,
        identity: &DeviceIdentity,
        sample: &SensorSample,
        link: &LinkState,
    ) -> Result<TelemetryMessage> {
        let zero = self.config.absent == AbsentFields::Zero;
        let fill = |present: bool| zero || present;

        let motion = match (sample.motion, zero) {
            (Some(motion), _) => Some(motion),
            (None, true) => Some(false),
            (None, false) => None,
        };

        let (pir_motion, motion_detected) = match self.config.motion {
            MotionField::PirMotion => (
                motion.map(|detected| if detected { PIR_MOTION } else { PIR_IDLE }),
                None,
            ),
            MotionField::MotionDetected => (None, motion),
        };

        let (uptime, timestamp) = match self.config.clock {
            ClockField::Uptime => (Some(sample.sampled_at), None),
            ClockField::Timestamp => (None, Some(sample.sampled_at)),
        };

        let wire = Wire {
            device_id: identity.device_id(),
            location: identity.location_name(),
            temperature: fill(sample.temperature.is_some())
                .then(|| sample.temperature.unwrap_or_default()),
            humidity: fill(sample.humidity.is_some()).then(|| sample.humidity.unwrap_or_default()),
            gas_level: fill(sample.gas_level.is_some())
                .then(|| sample.gas_level.unwrap_or_default()),
            pir_motion,
            motion_detected,
            rssi: link.signal_strength,
            uptime,
            timestamp,
        };

        let mut payload = Vec::with_capacity(192);
        let mut serializer = Serializer::with_formatter(&mut payload, TwoDecimals);
        wire.serialize(&mut serializer)?;

        // The serializer only emits valid UTF-8.
        Ok(TelemetryMessage(String::from_utf8_lossy(&payload).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use crate::device::DeviceIdentity;
    use crate::link::{LinkState, LinkStatus};
    use crate::sensor::SensorSample;

    use super::{AbsentFields, ClockField, Encoder, EncoderConfig, MotionField};

    fn link(rssi: i32) -> LinkState {
        LinkState {
            status: LinkStatus::Connected,
            signal_strength: rssi,
        }
    }

    fn climate_sample() -> SensorSample {
        SensorSample {
            temperature: Some(23.456),
            humidity: Some(55.1),
            gas_level: Some(120),
            motion: None,
            sampled_at: 15_000,
        }
    }

    #[test]
    fn canonical_climate_message() {
        let message = Encoder::default()
            .encode(&DeviceIdentity::new("node1"), &climate_sample(), &link(-62))
            .unwrap();

        assert_eq!(
            message.as_str(),
            r#"{"device_id":"node1","temperature":23.46,"humidity":55.10,"gas_level":120,"rssi":-62,"uptime":15000}"#
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let identity = DeviceIdentity::new("node1").location("lab");
        let encoder = Encoder::default();

        let first = encoder.encode(&identity, &climate_sample(), &link(-70)).unwrap();
        let second = encoder.encode(&identity, &climate_sample(), &link(-70)).unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn zero_values_keep_two_decimals() {
        let sample = SensorSample {
            temperature: Some(0.0),
            humidity: Some(0.0),
            ..climate_sample()
        };

        let message = Encoder::default()
            .encode(&DeviceIdentity::new("node1"), &sample, &link(-62))
            .unwrap();

        assert!(message.as_str().contains(r#""temperature":0.00,"humidity":0.00"#));
    }

    #[test]
    fn location_and_motion_fields() {
        let identity = DeviceIdentity::new("pir_test").location("hall");
        let sample = SensorSample {
            temperature: None,
            humidity: None,
            gas_level: None,
            motion: Some(true),
            sampled_at: 42,
        };

        let pir = Encoder::default()
            .encode(&identity, &sample, &link(-55))
            .unwrap();
        assert_eq!(
            pir.as_str(),
            r#"{"device_id":"pir_test","location":"hall","pir_motion":0,"rssi":-55,"uptime":42}"#
        );

        let boolean = Encoder::new(EncoderConfig {
            motion: MotionField::MotionDetected,
            clock: ClockField::Timestamp,
            absent: AbsentFields::Omit,
        })
        .encode(&identity, &sample, &link(-55))
        .unwrap();
        assert_eq!(
            boolean.as_str(),
            r#"{"device_id":"pir_test","location":"hall","motion_detected":true,"rssi":-55,"timestamp":42}"#
        );
    }

    #[test]
    fn absent_fields_as_zero() {
        let sample = SensorSample {
            temperature: None,
            humidity: None,
            gas_level: None,
            motion: None,
            sampled_at: 1000,
        };

        let message = Encoder::new(EncoderConfig {
            absent: AbsentFields::Zero,
            ..EncoderConfig::default()
        })
        .encode(&DeviceIdentity::new("node2"), &sample, &link(0))
        .unwrap();

        assert_eq!(
            message.as_str(),
            r#"{"device_id":"node2","temperature":0.00,"humidity":0.00,"gas_level":0,"pir_motion":1,"rssi":0,"uptime":1000}"#
        );
    }
}
