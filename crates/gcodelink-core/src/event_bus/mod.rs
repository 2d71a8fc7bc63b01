//! # Event Bus Module
//!
//! Publish/subscribe sink shared by the facade and its background tasks.
//!
//! ## Overview
//!
//! - The receive loop and the stream session publish [`ControlEvent`]s
//! - The shell subscribes with a handler or polls a broadcast receiver
//! - Events from one publisher arrive in the order they were published
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gcodelink_core::event_bus::{ControlEvent, EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Console]),
//!     |event| {
//!         if let ControlEvent::MessageReceived(line) = event {
//!             println!("<< {}", line);
//!         }
//!     },
//! );
//!
//! bus.publish(ControlEvent::MessageReceived("ok".to_string())).ok();
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
