use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use telenode::config::{LinkPolicy, NodeConfig, SessionPolicy};
use telenode::device::{BrokerData, Credentials, DeviceIdentity};
use telenode::node::Provisioning;
use telenode::sensor::InvalidReadingPolicy;
use telenode::telemetry::{AbsentFields, ClockField, EncoderConfig, MotionField};
use telenode::topic::Topics;

use crate::error::{Error, ErrorKind, Result};
use crate::sensors::SensorSettings;

// Control loop tick.
const TICK_MS: u64 = 100;

/// A node provisioning file.
///
/// ```toml
/// [device]
/// id = "node1"
/// location = "greenhouse"
///
/// [network]
/// ssid = "lab"
/// password = "secret"
///
/// [broker]
/// host = "localhost"
/// port = 1883
///
/// [topics]
/// namespace = "iot-cybot"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisioningFile {
    device: DeviceSection,
    network: NetworkSection,
    broker: BrokerSection,
    #[serde(default)]
    topics: TopicsSection,
    #[serde(default)]
    timing: TimingSection,
    #[serde(default)]
    telemetry: TelemetrySection,
    #[serde(default)]
    sensors: SensorSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceSection {
    id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkSection {
    ssid: String,
    password: String,
    #[serde(default = "default_rssi")]
    rssi: i32,
}

const fn default_rssi() -> i32 {
    -60
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BrokerSection {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

const fn default_port() -> u16 {
    1883
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopicsSection {
    #[serde(default = "default_namespace")]
    namespace: String,
    telemetry: Option<String>,
    control: Option<String>,
}

fn default_namespace() -> String {
    "iot-cybot".into()
}

impl Default for TopicsSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            telemetry: None,
            control: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimingSection {
    tick_ms: Option<u64>,
    publish_interval_ms: Option<u64>,
    restart_threshold: Option<u32>,
    association_window_ms: Option<u64>,
    backoff_base_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
    session_retry_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MotionKey {
    #[default]
    PirMotion,
    MotionDetected,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClockKey {
    #[default]
    Uptime,
    Timestamp,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Absent {
    #[default]
    Omit,
    Zero,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum InvalidReadings {
    #[default]
    ZeroFill,
    LastKnownGood,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TelemetrySection {
    #[serde(default)]
    motion: MotionKey,
    #[serde(default)]
    clock: ClockKey,
    #[serde(default)]
    absent: Absent,
    #[serde(default)]
    invalid_readings: InvalidReadings,
}

/// Everything needed to run a node, resolved from a [`ProvisioningFile`].
#[derive(Debug)]
pub struct Settings {
    /// Engine configuration.
    pub node: NodeConfig,
    /// Deploy-time data.
    pub provisioning: Provisioning,
    /// Interval between two control loop ticks.
    pub tick: Duration,
    /// Signal strength reported by the host link, in dBm.
    pub rssi: i32,
    /// Simulated sensors.
    pub sensors: SensorSettings,
}

impl ProvisioningFile {
    /// Reads and parses a provisioning file.
    ///
    /// # Errors
    ///
    /// The file cannot be read or is not a valid provisioning file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses a provisioning file.
    ///
    /// # Errors
    ///
    /// The content is not a valid provisioning file.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves the [`Settings`].
    ///
    /// # Errors
    ///
    /// The device identifier is empty, a broker login is incomplete, or the
    /// resulting engine configuration is not valid.
    pub fn into_settings(self) -> Result<Settings> {
        let Self {
            device,
            network,
            broker,
            topics,
            timing,
            telemetry,
            sensors,
        } = self;

        if device.id.trim().is_empty() {
            return Err(Error::new(ErrorKind::Config, "device id must not be empty"));
        }

        let mut broker_data = BrokerData::new(broker.host, broker.port);
        match (broker.username, broker.password) {
            (Some(username), Some(password)) => broker_data = broker_data.login(username, password),
            (None, None) => {}
            _ => {
                return Err(Error::new(
                    ErrorKind::Config,
                    "broker username and password must be set together",
                ));
            }
        }

        let per_device = Topics::per_device(&topics.namespace, &device.id);
        let topics = match (topics.telemetry, topics.control) {
            (None, None) => per_device,
            (telemetry, control) => Topics::shared(
                telemetry.unwrap_or_else(|| per_device.telemetry().to_string()),
                control.unwrap_or_else(|| per_device.control().to_string()),
            ),
        };

        let mut identity = DeviceIdentity::new(device.id);
        if let Some(location) = device.location {
            identity = identity.location(location);
        }

        let node = timing.node_config(telemetry.encoder_config(), telemetry.invalid_readings());
        node.validate()?;

        Ok(Settings {
            node,
            provisioning: Provisioning {
                identity,
                credentials: Credentials::new(network.ssid, network.password),
                broker: broker_data,
                topics,
            },
            tick: Duration::from_millis(timing.tick_ms.unwrap_or(TICK_MS).max(1)),
            rssi: network.rssi,
            sensors,
        })
    }
}

impl TimingSection {
    fn node_config(&self, encoder: EncoderConfig, invalid: InvalidReadingPolicy) -> NodeConfig {
        let defaults = NodeConfig::default();
        let ms = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);

        NodeConfig::default()
            .publish_interval(ms(self.publish_interval_ms, defaults.publish_interval))
            .restart_threshold(self.restart_threshold.unwrap_or(defaults.restart_threshold))
            .link(LinkPolicy {
                association_window: ms(
                    self.association_window_ms,
                    defaults.link.association_window,
                ),
                backoff_base: ms(self.backoff_base_ms, defaults.link.backoff_base),
                backoff_max: ms(self.backoff_max_ms, defaults.link.backoff_max),
            })
            .session(SessionPolicy {
                retry_delay: ms(self.session_retry_ms, defaults.session.retry_delay),
                connect_timeout: ms(self.connect_timeout_ms, defaults.session.connect_timeout),
            })
            .encoder(encoder)
            .invalid_readings(invalid)
    }
}

impl TelemetrySection {
    const fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            motion: match self.motion {
                MotionKey::PirMotion => MotionField::PirMotion,
                MotionKey::MotionDetected => MotionField::MotionDetected,
            },
            clock: match self.clock {
                ClockKey::Uptime => ClockField::Uptime,
                ClockKey::Timestamp => ClockField::Timestamp,
            },
            absent: match self.absent {
                Absent::Omit => AbsentFields::Omit,
                Absent::Zero => AbsentFields::Zero,
            },
        }
    }

    const fn invalid_readings(&self) -> InvalidReadingPolicy {
        match self.invalid_readings {
            InvalidReadings::ZeroFill => InvalidReadingPolicy::ZeroFill,
            InvalidReadings::LastKnownGood => InvalidReadingPolicy::LastKnownGood,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use telenode::sensor::InvalidReadingPolicy;
    use telenode::telemetry::{ClockField, MotionField};

    use crate::error::ErrorKind;

    use super::ProvisioningFile;

    const MINIMAL: &str = r#"
        [device]
        id = "node1"

        [network]
        ssid = "lab"
        password = "secret"

        [broker]
        host = "localhost"
    "#;

    #[test]
    fn minimal_file_uses_defaults() {
        let settings = ProvisioningFile::parse(MINIMAL)
            .unwrap()
            .into_settings()
            .unwrap();

        assert_eq!(settings.node.publish_interval, Duration::from_secs(5));
        assert_eq!(settings.node.restart_threshold, 10);
        assert_eq!(settings.tick, Duration::from_millis(100));
        assert_eq!(settings.rssi, -60);

        let provisioning = settings.provisioning;
        assert_eq!(provisioning.identity.device_id(), "node1");
        assert_eq!(provisioning.identity.location_name(), None);
        assert_eq!(provisioning.broker.port, 1883);
        assert!(provisioning.broker.login.is_none());
        assert_eq!(
            provisioning.topics.telemetry().as_str(),
            "iot-cybot/node1/data"
        );
        assert_eq!(provisioning.topics.control().as_str(), "iot-cybot/node1/cmd");
    }

    #[test]
    fn complete_file() {
        let content = r#"
            [device]
            id = "pir_test"
            location = "hall"

            [network]
            ssid = "lab"
            password = "secret"
            rssi = -71

            [broker]
            host = "192.168.1.10"
            port = 1884
            username = "node"
            password = "s3cret"

            [topics]
            telemetry = "iot-cybot/pir/test"

            [timing]
            tick_ms = 50
            publish_interval_ms = 2000
            restart_threshold = 3
            session_retry_ms = 1000

            [telemetry]
            motion = "motion_detected"
            clock = "timestamp"
            invalid_readings = "last_known_good"

            [sensors]
            gas = false
        "#;

        let settings = ProvisioningFile::parse(content)
            .unwrap()
            .into_settings()
            .unwrap();

        assert_eq!(settings.node.publish_interval, Duration::from_secs(2));
        assert_eq!(settings.node.restart_threshold, 3);
        assert_eq!(settings.node.session.retry_delay, Duration::from_secs(1));
        assert_eq!(settings.node.encoder.motion, MotionField::MotionDetected);
        assert_eq!(settings.node.encoder.clock, ClockField::Timestamp);
        assert_eq!(
            settings.node.invalid_readings,
            InvalidReadingPolicy::LastKnownGood
        );
        assert_eq!(settings.tick, Duration::from_millis(50));
        assert_eq!(settings.rssi, -71);
        assert!(!settings.sensors.gas);

        let provisioning = settings.provisioning;
        assert_eq!(provisioning.identity.location_name(), Some("hall"));
        assert_eq!(provisioning.broker.port, 1884);
        assert_eq!(
            provisioning.broker.login.map(|login| login.username),
            Some("node".into())
        );
        assert_eq!(
            provisioning.topics.telemetry().as_str(),
            "iot-cybot/pir/test"
        );
        assert_eq!(
            provisioning.topics.control().as_str(),
            "iot-cybot/pir_test/cmd"
        );
    }

    #[test]
    fn example_file_is_valid() {
        let settings =
            ProvisioningFile::parse(include_str!("../../../telenode.example.toml"))
                .unwrap()
                .into_settings()
                .unwrap();

        assert_eq!(settings.node, telenode::config::NodeConfig::default());
        assert_eq!(
            settings.provisioning.identity.location_name(),
            Some("greenhouse")
        );
    }

    #[test]
    fn rejected_files() {
        let unknown_field = format!("{MINIMAL}\n[timing]\nfrequency = 3\n");
        assert_eq!(
            ProvisioningFile::parse(&unknown_field).unwrap_err().kind(),
            ErrorKind::Config
        );

        let half_login = format!("{MINIMAL}username = \"node\"\n");
        assert_eq!(
            ProvisioningFile::parse(&half_login)
                .unwrap()
                .into_settings()
                .unwrap_err()
                .kind(),
            ErrorKind::Config
        );

        let zero_threshold = format!("{MINIMAL}\n[timing]\nrestart_threshold = 0\n");
        assert_eq!(
            ProvisioningFile::parse(&zero_threshold)
                .unwrap()
                .into_settings()
                .unwrap_err()
                .kind(),
            ErrorKind::Engine
        );

        let missing_broker = "[device]\nid = \"node1\"\n[network]\nssid = \"a\"\npassword = \"b\"\n";
        assert!(ProvisioningFile::parse(missing_broker).is_err());
    }
}
