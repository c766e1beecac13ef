// src/ami/client.rs
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ami::block::RawBlock;
use crate::ami::connection::{logoff, read_blocks, AmiConnection};
use crate::ami::state::{ConnectionState, SessionEvent};
use crate::config::AmiServer;
use crate::error::BridgeError;

const LOGOFF_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub server: AmiServer,
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
    pub fail_fast_on_auth: bool,
}

/// Owns the single AMI session of the process and keeps it alive.
///
/// Each session spawns its own reader task that feeds the block queue;
/// the supervisor only watches it, so reconnecting never waits on
/// classification or delivery.
pub struct AmiClient {
    settings: SupervisorSettings,
    endpoint: String,
    blocks: mpsc::Sender<RawBlock>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
}

impl AmiClient {
    pub fn new(
        settings: SupervisorSettings,
        blocks: mpsc::Sender<RawBlock>,
        shutdown: CancellationToken,
    ) -> Self {
        let endpoint = settings.server.endpoint();
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            settings,
            endpoint,
            blocks,
            state,
            shutdown,
        }
    }

    /// Observe state changes, e.g. to wait for `Active`.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn advance(&self, event: SessionEvent) {
        self.state.send_if_modified(|state| {
            let next = state.on(event);
            let changed = next != *state;
            *state = next;
            changed
        });
    }

    /// Run until shutdown. Only returns an error when authentication is
    /// rejected and fail-fast is configured.
    pub async fn run(&self) -> Result<(), BridgeError> {
        self.advance(SessionEvent::Connect);

        loop {
            let session = info_span!(
                "ami_session",
                session = %Uuid::new_v4(),
                endpoint = %self.endpoint
            );

            let error = match self.run_session().instrument(session).await {
                Ok(()) => break,
                Err(e) => e,
            };

            match &error {
                BridgeError::Closed => {
                    self.advance(SessionEvent::Closed);
                    info!("AMI connection closed: {}", self.endpoint);
                }
                e if e.is_authentication() => {
                    self.advance(SessionEvent::Failed);
                    error!("AMI credentials rejected by {}: {}", self.endpoint, e);
                }
                e => {
                    self.advance(SessionEvent::Failed);
                    error!("AMI error for {}: {}", self.endpoint, e);
                }
            }

            if error.is_authentication() && self.settings.fail_fast_on_auth {
                self.advance(SessionEvent::Shutdown);
                return Err(error);
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            self.advance(SessionEvent::RetryScheduled);
            warn!(
                "Reconnecting to {} in {:?}...",
                self.endpoint, self.settings.reconnect_delay
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.settings.reconnect_delay) => {}
            }

            self.advance(SessionEvent::DelayElapsed);
        }

        self.advance(SessionEvent::Shutdown);
        info!("AMI supervisor stopped: {}", self.endpoint);
        Ok(())
    }

    /// Connect, authenticate, then stay active until the reader stops.
    /// `Ok` means shutdown was requested.
    async fn run_session(&self) -> Result<(), BridgeError> {
        let server = &self.settings.server;
        info!("Connecting to AMI: {}", self.endpoint);

        let connect = async {
            let mut connection = AmiConnection::connect(&server.host, server.port).await?;
            self.advance(SessionEvent::TransportUp);

            connection
                .login(
                    &server.username,
                    &server.secret,
                    self.settings.handshake_timeout,
                )
                .await?;
            Ok::<_, BridgeError>(connection)
        };

        let connection = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            connection = connect => connection?,
        };

        self.advance(SessionEvent::LoginAccepted);

        let (mut sink, stream) = connection.into_split();
        let reader_shutdown = self.shutdown.child_token();
        let mut reader = tokio::spawn(
            read_blocks(stream, self.blocks.clone(), reader_shutdown.clone())
                .in_current_span(),
        );

        tokio::select! {
            result = &mut reader => {
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e),
                    Err(join_error) => Err(BridgeError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        join_error,
                    ))),
                };
            }
            _ = self.shutdown.cancelled() => {}
        }

        logoff(&mut sink, LOGOFF_TIMEOUT).await;
        reader_shutdown.cancel();
        if let Err(e) = reader.await {
            warn!("Reader task ended abnormally: {}", e);
        }

        Ok(())
    }
}
