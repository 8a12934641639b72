//! `telenode-drivers` provides architecture-agnostic input adapters for
//! sensor nodes.
//!
//! All adapters are implemented using only the [`embedded-hal`] traits,
//! so they run on any platform supporting these abstractions, including a
//! host where the pins are simulated.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![no_std]

/// The passive infrared motion sensor adapter.
#[cfg(feature = "pir")]
pub mod pir;
