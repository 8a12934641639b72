//! `telenode` is the connectivity and telemetry engine of a
//! network-attached sensor node.
//!
//! This crate provides APIs to:
//!
//! - Keep the node associated with its local network, retrying with a capped
//!   exponential backoff
//! - Maintain a publish/subscribe session with a broker on top of that link
//! - Sample the node sensors and encode a canonical telemetry message
//! - Publish telemetry on a fixed interval
//! - Interpret remote commands delivered on the node control channel
//! - Escalate to a full node restart when the session cannot be
//!   re-established
//!
//! The engine is strictly single-threaded and cooperative. A [`node::Node`]
//! owns every component through an explicit [`node::Context`] and is driven
//! by calling [`node::Node::tick`] from the platform main loop. No component
//! ever blocks: reconnect waits are timers checked against the monotonic
//! millisecond counter passed to each tick.
//!
//! Hardware and networking are reached only through traits:
//!
//! - [`link::LinkDriver`] for network association
//! - [`session::Transport`] for the broker session
//! - [`sensor::SensorBank`] for sensor readings
//!
//! A restart is never performed by the engine itself. It is a terminal
//! [`node::Flow`] returned to the platform runner, which then reboots the
//! node without saving any state.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Capped exponential backoff timer.
pub mod backoff;
/// Remote commands received on the control channel.
pub mod command;
/// Engine configuration.
pub mod config;
/// Device identity and provisioning data.
pub mod device;
/// Error management.
pub mod error;
/// Network link lifecycle.
pub mod link;
/// The execution context and the control loop.
pub mod node;
/// Restart escalation policy.
pub mod restart;
/// Publish scheduling.
pub mod scheduler;
/// Sensor sampling.
pub mod sensor;
/// Broker session lifecycle.
pub mod session;
/// Telemetry encoding.
pub mod telemetry;
/// Publish and control topics.
pub mod topic;
