use std::time::Duration;

use log::{debug, error, info};

use crate::backoff::duration_ms;
use crate::link::{LinkDriver, LinkStatus};
use crate::node::{Context, Flow};
use crate::sensor::SensorBank;
use crate::session::{ConnectRequest, SessionStatus, SessionStep, Transport};

/// Drives one cooperative tick of a node and publishes telemetry at a
/// fixed interval.
///
/// A tick runs, in order:
///
/// 1. Link maintenance
/// 2. Session maintenance, escalating to a restart at the failure threshold
/// 3. Delivery of the received commands
/// 4. The publish decision, then sampling, encoding and publishing
///
/// A node which has never published publishes as soon as its link and its
/// session are up.
///
/// The scheduler is idle between ticks. Publishing happens within a single
/// tick and always ends idle, whatever the publish outcome, so only the time
/// of the last publish attempt is kept.
#[derive(Debug, Clone)]
pub struct PublishScheduler {
    interval_ms: u64,
    last_publish: Option<u64>,
}

impl PublishScheduler {
    /// Creates a [`PublishScheduler`] which never published yet.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: duration_ms(interval),
            last_publish: None,
        }
    }

    /// Returns the time of the last publish attempt, if any.
    #[must_use]
    #[inline]
    pub const fn last_publish(&self) -> Option<u64> {
        self.last_publish
    }

    /// Whether a publish is due at `now_ms`.
    #[must_use]
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_publish
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms)
    }

    /// Runs one tick.
    pub fn tick<L, T, S>(&mut self, ctx: &mut Context<L, T, S>, now_ms: u64) -> Flow
    where
        L: LinkDriver,
        T: Transport,
        S: SensorBank,
    {
        if ctx.link.ensure_connected(&ctx.credentials, now_ms) == LinkStatus::Disconnected {
            ctx.session.link_lost();
            return Flow::Continue;
        }

        let request = ConnectRequest {
            client_id: ctx.identity.device_id(),
            broker: &ctx.broker,
            control: ctx.topics.control(),
        };
        if let SessionStep::Failed(failures) = ctx.session.ensure_connected(&request, now_ms)
            && let Some(reason) = ctx.restart.observe(failures)
        {
            return Flow::Restart(reason);
        }

        if let Some(reason) = ctx.session.drain_inbound(&ctx.commands) {
            return Flow::Restart(reason);
        }

        if !self.is_due(now_ms) {
            return Flow::Continue;
        }

        if ctx.session.state().status != SessionStatus::Connected {
            debug!("Publish due, waiting for the session");
            return Flow::Continue;
        }

        self.publish(ctx, now_ms);
        Flow::Continue
    }

    fn publish<L, T, S>(&mut self, ctx: &mut Context<L, T, S>, now_ms: u64)
    where
        L: LinkDriver,
        T: Transport,
        S: SensorBank,
    {
        let sample = ctx.sampler.read(&mut ctx.sensors, now_ms);
        match ctx.encoder.encode(&ctx.identity, &sample, ctx.link.state()) {
            Ok(message) => {
                let topic = ctx.topics.telemetry();
                if ctx.session.publish(topic.as_str(), message.as_bytes()) {
                    info!("Published telemetry on `{topic}`");
                    debug!("{}", message.as_str());
                }
            }
            Err(e) => error!("Telemetry dropped: {e}"),
        }

        // Recorded whatever the outcome: a failed publish waits for the next
        // interval.
        self.last_publish = Some(now_ms);
    }
}
