//! `telenode-os` runs a `telenode` sensor node on an operating system.
//!
//! It provides:
//!
//! - An `MQTT` v5 [`transport::MqttTransport`] backed by `rumqttc`
//! - A [`link::HostLink`] for networks managed by the host
//! - [`sensors::SimulatedSensors`] for nodes without real hardware
//! - A TOML [`config::ProvisioningFile`]
//! - The asynchronous control loop [`runner::run`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Provisioning file.
pub mod config;
/// Error management.
pub mod error;
/// Host network link.
pub mod link;
/// Control loop.
pub mod runner;
/// Simulated sensors.
pub mod sensors;
/// `MQTT` transport.
pub mod transport;
