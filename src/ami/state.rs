//! Session lifecycle state machine
//!
//! The supervisor never changes state directly: it reports what happened
//! as a [`SessionEvent`] and applies [`ConnectionState::on`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Active,
    /// Waiting out the reconnect delay
    Backoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Open a transport
    Connect,
    /// TCP connected, credentials sent
    TransportUp,
    /// Login reply reported success
    LoginAccepted,
    /// I/O error, rejected login or handshake timeout
    Failed,
    /// Peer closed the stream
    Closed,
    /// Reconnect delay started
    RetryScheduled,
    /// Reconnect delay finished
    DelayElapsed,
    Shutdown,
}

impl ConnectionState {
    /// Pure transition function. Events that make no sense in the current
    /// state leave it unchanged.
    pub fn on(self, event: SessionEvent) -> ConnectionState {
        use ConnectionState::*;
        use SessionEvent::*;

        match (self, event) {
            (_, Failed | Closed | Shutdown) => Disconnected,
            (Disconnected, Connect) => Connecting,
            (Connecting, TransportUp) => Authenticating,
            (Authenticating, LoginAccepted) => Active,
            (Disconnected, RetryScheduled) => Backoff,
            (Backoff, DelayElapsed) => Connecting,
            (state, _) => state,
        }
    }

    /// Only an active session may hand blocks to the pipeline.
    pub fn is_active(self) -> bool {
        self == ConnectionState::Active
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Active => "active",
            ConnectionState::Backoff => "backoff",
        };
        f.write_str(name)
    }
}
