use std::fmt;

/// A publish/subscribe topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic(String);

impl Topic {
    /// Creates a [`Topic`].
    #[must_use]
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the [`Topic`] as a [`&str`].
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The topics used by a node.
///
/// Telemetry is published on the telemetry topic, while remote commands
/// arrive on the control topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    telemetry: Topic,
    control: Topic,
}

impl Topics {
    /// Derives both topics from a namespace and a device identifier:
    /// `<namespace>/<device_id>/data` and `<namespace>/<device_id>/cmd`.
    #[must_use]
    pub fn per_device(namespace: &str, device_id: &str) -> Self {
        Self {
            telemetry: Topic::new(format!("{namespace}/{device_id}/data")),
            control: Topic::new(format!("{namespace}/{device_id}/cmd")),
        }
    }

    /// Uses literal topics, for deployments where every node publishes on a
    /// single shared telemetry topic.
    #[must_use]
    pub fn shared(telemetry: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            telemetry: Topic::new(telemetry),
            control: Topic::new(control),
        }
    }

    /// Returns the telemetry topic.
    #[must_use]
    #[inline]
    pub fn telemetry(&self) -> &Topic {
        &self.telemetry
    }

    /// Returns the control topic.
    #[must_use]
    #[inline]
    pub fn control(&self) -> &Topic {
        &self.control
    }
}

#[cfg(test)]
mod tests {
    use super::Topics;

    #[test]
    fn per_device_topics() {
        let topics = Topics::per_device("iot-cybot", "node1");

        assert_eq!(topics.telemetry().as_str(), "iot-cybot/node1/data");
        assert_eq!(topics.control().as_str(), "iot-cybot/node1/cmd");
    }

    #[test]
    fn shared_topics() {
        let topics = Topics::shared("iot-cybot/gas/test", "iot-cybot/node1/cmd");

        assert_eq!(topics.telemetry().to_string(), "iot-cybot/gas/test");
        assert_eq!(topics.control().as_str(), "iot-cybot/node1/cmd");
    }
}
