//! Event system for the fleet coordination core
//!
//! This crate provides the event bus and event types used to move status
//! reports, desired-state commands, and cross-robot signals between
//! components.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
