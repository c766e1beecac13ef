//! Survey bridge: follows an Asterisk Manager Interface event stream, tracks
//! calls routed to a survey extension and reports each call's keypad
//! rating to an HTTP receiver.
//!
//! # Architecture
//!
//! ```text
//! Asterisk AMI
//!       |
//!       v
//!  AmiClient (connect, login, retry)
//!       |
//!       v
//!  BlockCodec (RawBlock parser)
//!       |
//!       v
//!  EventRouter + ConversationTable
//!       |
//!       v
//!  DeliveryClient (POST /agent_start, /customer_join, /rate)
//! ```

pub mod ami;
pub mod bridge;
pub mod config;
pub mod delivery;
pub mod error;
pub mod survey;

pub use bridge::{Bridge, RunningBridge};
pub use config::Config;
pub use error::{BridgeError, ConfigError, DeliveryError};
