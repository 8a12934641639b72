use std::io;
use std::net::SocketAddr;

use tokio::net::lookup_host;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use tracing::{debug, warn};

use telenode::device::{BrokerData, Credentials};
use telenode::error::Error;
use telenode::link::LinkDriver;

type Lookup = oneshot::Receiver<io::Result<Option<SocketAddr>>>;

/// The network link of a host.
///
/// The host network is managed by the operating system, so the link is
/// considered associated once the broker address resolves. The signal
/// strength is a provisioned constant.
///
/// Resolution runs as a task on the given runtime and is only polled by
/// [`LinkDriver::is_associated`], a slow resolver never stalls the caller.
#[derive(Debug)]
pub struct HostLink {
    runtime: Handle,
    host: String,
    port: u16,
    rssi: i32,
    lookup: Option<Lookup>,
    resolved: Option<SocketAddr>,
}

impl HostLink {
    /// Creates a [`HostLink`] towards the given broker, resolving it on
    /// `runtime`.
    #[must_use]
    pub fn new(runtime: Handle, broker: &BrokerData, rssi: i32) -> Self {
        Self {
            runtime,
            host: broker.host.clone(),
            port: broker.port,
            rssi,
            lookup: None,
            resolved: None,
        }
    }

    /// Returns the resolved broker address, if any.
    #[must_use]
    #[inline]
    pub const fn resolved(&self) -> Option<SocketAddr> {
        self.resolved
    }

    // Collects the lookup outcome, if it is ready.
    fn poll_lookup(&mut self) {
        let Some(lookup) = self.lookup.as_mut() else {
            return;
        };

        let outcome = match lookup.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err(io::Error::other("lookup aborted")),
        };
        self.lookup = None;

        match outcome {
            Ok(Some(address)) => {
                debug!("`{}` resolved to {address}", self.host);
                self.resolved = Some(address);
            }
            Ok(None) => warn!("No address for `{}`", self.host),
            Err(e) => warn!("Cannot resolve `{}`: {e}", self.host),
        }
    }
}

impl LinkDriver for HostLink {
    type Error = Error;

    fn associate(&mut self, credentials: &Credentials) -> Result<(), Self::Error> {
        debug!(
            "Network `{}` is managed by the host, resolving `{}:{}`",
            credentials.ssid, self.host, self.port
        );

        let (sender, receiver) = oneshot::channel();
        let host = self.host.clone();
        let port = self.port;

        drop(self.runtime.spawn(async move {
            let outcome = lookup_host((host.as_str(), port))
                .await
                .map(|mut addresses| addresses.next());
            if sender.send(outcome).is_err() {
                debug!("Lookup of `{host}` no longer awaited");
            }
        }));

        // A new attempt replaces any lookup still in flight.
        self.lookup = Some(receiver);
        self.resolved = None;
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        self.poll_lookup();
        self.resolved.is_some()
    }

    fn signal_strength(&mut self) -> i32 {
        if self.resolved.is_some() { self.rssi } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::runtime::Handle;
    use tokio::time::timeout;

    use telenode::device::{BrokerData, Credentials};
    use telenode::link::LinkDriver;

    use super::HostLink;

    async fn settle(link: &mut HostLink) {
        let _ = timeout(Duration::from_secs(5), async {
            while link.lookup.is_some() {
                let _ = link.is_associated();
                tokio::task::yield_now().await;
            }
        })
        .await;
    }

    #[tokio::test]
    async fn pending_lookup_is_not_associated() {
        let mut link = HostLink::new(Handle::current(), &BrokerData::new("127.0.0.1", 1883), -55);

        link.associate(&Credentials::new("lab", "secret")).unwrap();

        // The lookup task has not run yet.
        assert!(!link.is_associated());
        assert_eq!(link.signal_strength(), 0);
        assert!(link.lookup.is_some());
    }

    #[tokio::test]
    async fn literal_address_associates() {
        let mut link = HostLink::new(Handle::current(), &BrokerData::new("127.0.0.1", 1883), -55);
        assert!(!link.is_associated());

        link.associate(&Credentials::new("lab", "secret")).unwrap();
        settle(&mut link).await;

        assert!(link.is_associated());
        assert_eq!(link.signal_strength(), -55);
        assert_eq!(
            link.resolved().map(|address| address.port()),
            Some(1883)
        );
    }

    #[tokio::test]
    async fn invalid_address_never_associates() {
        let mut link = HostLink::new(
            Handle::current(),
            &BrokerData::new("not a host name", 1883),
            -55,
        );

        link.associate(&Credentials::new("lab", "secret")).unwrap();
        settle(&mut link).await;

        assert!(!link.is_associated());
        assert_eq!(link.resolved(), None);
    }
}
