//! # GCodeLink Core
//!
//! Core types shared by every GCodeLink crate: the error taxonomy, the
//! connection and stream state enums, and the event bus background tasks
//! publish to.

pub mod data;
pub mod error;
pub mod event_bus;

pub use data::{ConnectionState, StreamStatus};

pub use error::{ConnectError, Error, FileError, ReadError, Result, WriteError};

pub use event_bus::{
    ControlEvent, EventBus, EventBusConfig, EventBusError, EventCategory, EventFilter,
    SubscriptionId,
};
