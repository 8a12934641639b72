use std::fmt;

use log::{debug, info, warn};

use crate::backoff::duration_ms;
use crate::command::{Command, CommandHandler, CommandMessage};
use crate::config::SessionPolicy;
use crate::device::BrokerData;
use crate::restart::RestartReason;
use crate::topic::Topic;

/// Session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session.
    #[default]
    Disconnected,
    /// A connect request waits for the broker acknowledgement.
    Connecting,
    /// The session is established and the control topic subscribed.
    Connected,
}

/// Session state.
///
/// Only the [`SessionManager`] mutates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Session status.
    pub status: SessionStatus,
    /// Failed connect attempts since the last successful one.
    pub consecutive_failures: u32,
}

/// Everything a [`Transport`] needs to open a session.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    /// Client identifier presented to the broker.
    pub client_id: &'a str,
    /// Broker address and optional login.
    pub broker: &'a BrokerData,
    /// Topic to subscribe to once connected.
    pub control: &'a Topic,
}

/// Connection as observed by a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// Waiting for the broker acknowledgement.
    Pending,
    /// Acknowledged by the broker.
    Up,
    /// Refused, lost, or never requested.
    Down,
}

/// A publish/subscribe client.
///
/// Every method must return immediately. The connection progresses in the
/// background and is observed through [`Transport::connection`], while
/// received messages are buffered until [`Transport::receive`] is called.
pub trait Transport {
    /// Transport error.
    type Error: fmt::Display;

    /// Starts connecting to the broker.
    ///
    /// # Errors
    ///
    /// The connect request cannot be issued.
    fn connect(&mut self, request: &ConnectRequest<'_>) -> Result<(), Self::Error>;

    /// Returns the connection state.
    fn connection(&mut self) -> Connection;

    /// Drops the connection, discarding any buffered message.
    fn disconnect(&mut self);

    /// Subscribes to a topic.
    ///
    /// # Errors
    ///
    /// The subscription cannot be issued.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Publishes a payload on a topic.
    ///
    /// # Errors
    ///
    /// The message cannot be handed to the network.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Pops the oldest received message.
    fn receive(&mut self) -> Option<CommandMessage>;
}

/// Outcome of [`SessionManager::ensure_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// The session is connected.
    Ready,
    /// Connecting, or waiting for the retry delay to elapse.
    Pending,
    /// A connect attempt just failed. Carries the consecutive failures.
    Failed(u32),
}

/// Owns the broker session.
#[derive(Debug)]
pub struct SessionManager<T: Transport> {
    transport: T,
    state: SessionState,
    retry_at: u64,
    connect_deadline: u64,
    retry_delay_ms: u64,
    connect_timeout_ms: u64,
}

impl<T: Transport> SessionManager<T> {
    /// Creates a [`SessionManager`] for the given transport.
    #[must_use]
    pub fn new(transport: T, policy: &SessionPolicy) -> Self {
        Self {
            transport,
            state: SessionState::default(),
            retry_at: 0,
            connect_deadline: 0,
            retry_delay_ms: duration_ms(policy.retry_delay),
            connect_timeout_ms: duration_ms(policy.connect_timeout),
        }
    }

    /// Returns the current [`SessionState`].
    #[must_use]
    #[inline]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Returns the transport.
    #[must_use]
    #[inline]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport mutably.
    #[must_use]
    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Keeps the session established.
    ///
    /// A failed attempt increments the consecutive failures counter and
    /// delays the next attempt by the fixed retry delay. An attempt which is
    /// not acknowledged within the connect timeout counts as failed.
    pub fn ensure_connected(&mut self, request: &ConnectRequest<'_>, now_ms: u64) -> SessionStep {
        match self.state.status {
            SessionStatus::Connected => {
                if self.transport.connection() == Connection::Up {
                    return SessionStep::Ready;
                }
                warn!(
                    "Session with `{}:{}` dropped",
                    request.broker.host, request.broker.port
                );
                self.transport.disconnect();
                self.state.status = SessionStatus::Disconnected;
                self.start(request, now_ms)
            }
            SessionStatus::Connecting => match self.transport.connection() {
                Connection::Up => self.established(request, now_ms),
                Connection::Down => self.fail(now_ms, &"connection refused"),
                Connection::Pending if now_ms >= self.connect_deadline => {
                    self.fail(now_ms, &"connect timeout")
                }
                Connection::Pending => SessionStep::Pending,
            },
            SessionStatus::Disconnected if now_ms >= self.retry_at => self.start(request, now_ms),
            SessionStatus::Disconnected => SessionStep::Pending,
        }
    }

    /// Publishes a payload.
    ///
    /// Nothing is sent unless the session is connected. A transport failure
    /// is logged and reported as `false`, it is never retried.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if self.state.status != SessionStatus::Connected {
            debug!("Session not connected, publish on `{topic}` skipped");
            return false;
        }

        match self.transport.publish(topic, payload) {
            Ok(()) => true,
            Err(e) => {
                warn!("Publish on `{topic}` failed: {e}");
                false
            }
        }
    }

    /// Delivers every buffered message to the [`CommandHandler`], in
    /// receipt order.
    ///
    /// Stops at the first restart command, the messages left behind are
    /// lost with the restart.
    pub fn drain_inbound(&mut self, handler: &CommandHandler) -> Option<RestartReason> {
        while let Some(message) = self.transport.receive() {
            if handler.handle(&message) == Command::Restart {
                return Some(RestartReason::Command);
            }
        }
        None
    }

    /// Tears the session down after a link loss.
    ///
    /// This is not a connect failure: the counter is left untouched.
    pub fn link_lost(&mut self) {
        if self.state.status == SessionStatus::Disconnected {
            return;
        }
        info!("Link lost, closing the session");
        self.transport.disconnect();
        self.state.status = SessionStatus::Disconnected;
    }

    fn start(&mut self, request: &ConnectRequest<'_>, now_ms: u64) -> SessionStep {
        info!(
            "Connecting to `{}:{}` as `{}`",
            request.broker.host, request.broker.port, request.client_id
        );

        match self.transport.connect(request) {
            Ok(()) => {
                self.state.status = SessionStatus::Connecting;
                self.connect_deadline = now_ms.saturating_add(self.connect_timeout_ms);
                SessionStep::Pending
            }
            Err(e) => self.fail(now_ms, &e),
        }
    }

    fn established(&mut self, request: &ConnectRequest<'_>, now_ms: u64) -> SessionStep {
        if let Err(e) = self.transport.subscribe(request.control.as_str()) {
            let reason = format!("subscription to `{}` failed: {e}", request.control);
            return self.fail(now_ms, &reason);
        }

        info!(
            "Session established, listening on `{}`",
            request.control
        );
        self.state.status = SessionStatus::Connected;
        self.state.consecutive_failures = 0;
        SessionStep::Ready
    }

    fn fail(&mut self, now_ms: u64, reason: &dyn fmt::Display) -> SessionStep {
        self.transport.disconnect();
        self.state.status = SessionStatus::Disconnected;
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        self.retry_at = now_ms.saturating_add(self.retry_delay_ms);

        warn!(
            "Session connect failed ({reason}), {} in a row; retrying in {} ms",
            self.state.consecutive_failures, self.retry_delay_ms
        );

        SessionStep::Failed(self.state.consecutive_failures)
    }
}
