//! # smarthub-domain
//!
//! Pure domain model for the smarthub integration hub.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps
//! - Define the **observable device** identity ([`device::DeviceSource`])
//! - Define **Things** (sensors/actuators tagged with name, location, description)
//! - Define **Device messages** (`{thing, property, value}` triples)
//! - Define **Payloads** carried by send/receive events
//! - Define **Events** (the single tagged-variant event type adapters emit)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.

pub mod error;
pub mod time;

pub mod device;
pub mod event;
pub mod message;
pub mod payload;
pub mod thing;
