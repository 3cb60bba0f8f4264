//! Client side of the relay: finding it, building payloads, sending them.

pub mod client;
pub mod discovery;
pub mod payload;

pub use client::{ClientError, Notifier};
