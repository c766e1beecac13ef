//! Survey receiver notifications
//!
//! ```text
//!  EventRouter ──try_send──> [bounded queue] ──> delivery worker ──POST──> receiver
//! ```
//!
//! The router never waits on this side: a full queue drops the event and a
//! failed POST is logged and forgotten.

mod client;
mod worker;

pub use client::{
    DeliveryClient, Notification, NotificationBody, Notifier, AGENT_START_PATH,
    CUSTOMER_JOIN_PATH, RATE_PATH,
};
pub use worker::run_delivery_worker;
