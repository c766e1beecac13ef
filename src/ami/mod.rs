//! Asterisk Manager Interface (AMI) client
//!
//! ```text
//!   Asterisk AMI (TCP)
//!         |
//!   AmiClient (supervisor: connect → login → active → retry)
//!         |
//!   read_blocks task ── BlockCodec ──> RawBlock queue
//! ```

pub mod block;
pub mod client;
pub mod codec;
pub mod connection;
pub mod state;

pub use block::RawBlock;
pub use client::{AmiClient, SupervisorSettings};
pub use codec::{BlockCodec, BlockParser};
pub use connection::AmiConnection;
pub use state::{ConnectionState, SessionEvent};
