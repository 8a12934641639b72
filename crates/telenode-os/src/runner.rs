use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use tracing::{error, info};

use telenode::link::LinkDriver;
use telenode::node::{Flow, Node};
use telenode::restart::RestartReason;
use telenode::sensor::SensorBank;
use telenode::session::Transport;

/// Exit code asking the service supervisor for a cold restart.
pub const RESTART_EXIT_CODE: i32 = 75;

/// Why the control loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The shutdown signal fired.
    Stopped,
    /// The node must restart.
    Restart(RestartReason),
}

/// Ticks the node every `tick` until it asks for a restart or `shutdown`
/// completes.
///
/// The tick clock is the time elapsed since the loop started, which plays
/// the role of the node uptime.
pub async fn run<L, T, S, F>(mut node: Node<L, T, S>, tick: Duration, shutdown: F) -> Exit
where
    L: LinkDriver,
    T: Transport,
    S: SensorBank,
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("Shutdown requested, stopping the node");
                return Exit::Stopped;
            }
            _ = interval.tick() => {
                let now_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if let Flow::Restart(reason) = node.tick(now_ms) {
                    error!("Restarting: {reason}");
                    return Exit::Restart(reason);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::{pending, ready};
    use std::time::Duration;

    use tokio::runtime::Handle;

    use telenode::command::CommandMessage;
    use telenode::config::{NodeConfig, SessionPolicy};
    use telenode::device::{BrokerData, Credentials, DeviceIdentity};
    use telenode::node::{Node, Provisioning};
    use telenode::restart::RestartReason;
    use telenode::session::{ConnectRequest, Connection, Transport};
    use telenode::topic::Topics;

    use crate::link::HostLink;
    use crate::sensors::{SensorSettings, SimulatedSensors};

    use super::{Exit, run};

    // A broker which is never reachable.
    struct Unreachable;

    impl Transport for Unreachable {
        type Error = &'static str;

        fn connect(&mut self, _request: &ConnectRequest<'_>) -> Result<(), Self::Error> {
            Err("connection refused")
        }

        fn connection(&mut self) -> Connection {
            Connection::Down
        }

        fn disconnect(&mut self) {}

        fn subscribe(&mut self, _topic: &str) -> Result<(), Self::Error> {
            Err("no session")
        }

        fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), Self::Error> {
            Err("no session")
        }

        fn receive(&mut self) -> Option<CommandMessage> {
            None
        }
    }

    fn node() -> Node<HostLink, Unreachable, SimulatedSensors> {
        let broker = BrokerData::new("127.0.0.1", 1883);
        let config = NodeConfig::default()
            .restart_threshold(3)
            .session(SessionPolicy {
                retry_delay: Duration::from_secs(1),
                ..SessionPolicy::default()
            });

        Node::new(
            &config,
            Provisioning {
                identity: DeviceIdentity::new("node1"),
                credentials: Credentials::new("lab", "secret"),
                broker: broker.clone(),
                topics: Topics::per_device("iot-cybot", "node1"),
            },
            HostLink::new(Handle::current(), &broker, -60),
            Unreachable,
            SimulatedSensors::new(SensorSettings::default()),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_after_repeated_failures() {
        let exit = run(node(), Duration::from_millis(100), pending()).await;

        assert_eq!(exit, Exit::Restart(RestartReason::SessionFailures(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let exit = run(node(), Duration::from_millis(100), ready(())).await;

        assert_eq!(exit, Exit::Stopped);
    }
}
