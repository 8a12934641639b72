use std::fmt;

/// The identity of a node.
///
/// It is set at provisioning time and never changes while the node runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    device_id: String,
    location: Option<String>,
}

impl DeviceIdentity {
    /// Creates a [`DeviceIdentity`] without a location.
    #[must_use]
    #[inline]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            location: None,
        }
    }

    /// Sets the node location.
    #[must_use]
    #[inline]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Returns the device identifier.
    #[must_use]
    #[inline]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the node location, if the deployment defines one.
    #[must_use]
    #[inline]
    pub fn location_name(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

/// Credentials used to associate with the local network.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Network name.
    pub ssid: String,
    /// Network passphrase.
    pub password: String,
}

impl Credentials {
    /// Creates [`Credentials`].
    #[must_use]
    #[inline]
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

// Never print the passphrase.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

/// Broker login.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerLogin {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for BrokerLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerLogin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Broker data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerData {
    /// Broker host name or address.
    pub host: String,
    /// Broker port number.
    pub port: u16,
    /// Optional login.
    pub login: Option<BrokerLogin>,
}

impl BrokerData {
    /// Creates an anonymous [`BrokerData`] from the host and port.
    #[must_use]
    #[inline]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            login: None,
        }
    }

    /// Authenticates the session with a username and password.
    #[must_use]
    #[inline]
    pub fn login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(BrokerLogin {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}
