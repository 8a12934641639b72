use log::info;

use crate::command::CommandHandler;
use crate::config::NodeConfig;
use crate::device::{BrokerData, Credentials, DeviceIdentity};
use crate::error::Result;
use crate::link::{LinkDriver, LinkManager};
use crate::restart::{RestartPolicy, RestartReason};
use crate::scheduler::PublishScheduler;
use crate::sensor::{Sampler, SensorBank};
use crate::session::{SessionManager, Transport};
use crate::telemetry::Encoder;
use crate::topic::Topics;

/// What the platform runner does after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep ticking.
    Continue,
    /// Restart the node now, without saving any state.
    Restart(RestartReason),
}

/// Data provisioned at deploy time.
#[derive(Debug, Clone)]
pub struct Provisioning {
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Local network credentials.
    pub credentials: Credentials,
    /// Broker data.
    pub broker: BrokerData,
    /// Telemetry and control topics.
    pub topics: Topics,
}

/// The execution context of a node.
///
/// It owns every component and is passed explicitly to the control loop.
/// There is exactly one link manager and one session manager per node.
#[derive(Debug)]
pub struct Context<L, T, S>
where
    L: LinkDriver,
    T: Transport,
    S: SensorBank,
{
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Local network credentials.
    pub credentials: Credentials,
    /// Broker data.
    pub broker: BrokerData,
    /// Telemetry and control topics.
    pub topics: Topics,
    /// Network link.
    pub link: LinkManager<L>,
    /// Broker session.
    pub session: SessionManager<T>,
    /// Sensor sampler.
    pub sampler: Sampler,
    /// Telemetry encoder.
    pub encoder: Encoder,
    /// Control channel interpreter.
    pub commands: CommandHandler,
    /// Restart escalation.
    pub restart: RestartPolicy,
    /// Node sensors.
    pub sensors: S,
}

/// A sensor node.
///
/// The platform calls [`Node::tick`] from its main loop with a monotonic
/// millisecond counter. Once a tick returns [`Flow::Restart`] the node is
/// done: every following tick returns the same decision without doing any
/// work.
#[derive(Debug)]
pub struct Node<L, T, S>
where
    L: LinkDriver,
    T: Transport,
    S: SensorBank,
{
    context: Context<L, T, S>,
    scheduler: PublishScheduler,
    restart: Option<RestartReason>,
}

impl<L, T, S> Node<L, T, S>
where
    L: LinkDriver,
    T: Transport,
    S: SensorBank,
{
    /// Creates a [`Node`].
    ///
    /// # Errors
    ///
    /// The configuration is not valid, see [`NodeConfig::validate`].
    pub fn new(
        config: &NodeConfig,
        provisioning: Provisioning,
        link: L,
        transport: T,
        sensors: S,
    ) -> Result<Self> {
        config.validate()?;

        let Provisioning {
            identity,
            credentials,
            broker,
            topics,
        } = provisioning;

        info!(
            "Node `{}` publishing on `{}`, control on `{}`",
            identity.device_id(),
            topics.telemetry(),
            topics.control()
        );

        let commands = CommandHandler::new(topics.control().clone());

        Ok(Self {
            context: Context {
                identity,
                credentials,
                broker,
                topics,
                link: LinkManager::new(link, &config.link),
                session: SessionManager::new(transport, &config.session),
                sampler: Sampler::new(config.invalid_readings),
                encoder: Encoder::new(config.encoder),
                commands,
                restart: RestartPolicy::new(config.restart_threshold),
                sensors,
            },
            scheduler: PublishScheduler::new(config.publish_interval),
            restart: None,
        })
    }

    /// Runs one cooperative tick at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Flow {
        if let Some(reason) = self.restart {
            return Flow::Restart(reason);
        }

        let flow = self.scheduler.tick(&mut self.context, now_ms);
        if let Flow::Restart(reason) = flow {
            self.restart = Some(reason);
        }
        flow
    }

    /// Returns the execution context.
    #[must_use]
    #[inline]
    pub const fn context(&self) -> &Context<L, T, S> {
        &self.context
    }

    /// Returns the execution context mutably.
    #[must_use]
    #[inline]
    pub fn context_mut(&mut self) -> &mut Context<L, T, S> {
        &mut self.context
    }

    /// Returns the publish scheduler.
    #[must_use]
    #[inline]
    pub const fn scheduler(&self) -> &PublishScheduler {
        &self.scheduler
    }

    /// Returns the pending restart, if one was decided.
    #[must_use]
    #[inline]
    pub const fn restart_reason(&self) -> Option<RestartReason> {
        self.restart
    }
}
