// src/ami/connection.rs
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ami::block::RawBlock;
use crate::ami::codec::BlockCodec;
use crate::error::BridgeError;

/// Read half of an authenticated session.
pub type BlockStream<S> = SplitStream<Framed<S, BlockCodec>>;
/// Write half of an authenticated session.
pub type BlockSink<S> = SplitSink<Framed<S, BlockCodec>, RawBlock>;

pub struct AmiConnection<S = TcpStream> {
    framed: Framed<S, BlockCodec>,
    endpoint: String,
}

impl AmiConnection<TcpStream> {
    pub async fn connect(host: &str, port: u16) -> Result<Self, BridgeError> {
        let endpoint = format!("{}:{}", host, port);
        debug!("Opening TCP connection to {}", endpoint);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| BridgeError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        Ok(Self::new(stream, endpoint))
    }
}

impl<S> AmiConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, endpoint: impl Into<String>) -> Self {
        Self {
            framed: Framed::new(stream, BlockCodec::new()),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the `Login` action and wait for its reply.
    ///
    /// The manager banner has no colon and never forms a block of its own.
    /// Blocks that are not the reply to this login are skipped.
    pub async fn login(
        &mut self,
        username: &str,
        secret: &str,
        limit: Duration,
    ) -> Result<(), BridgeError> {
        let action_id = Uuid::new_v4().to_string();
        let action = RawBlock::new()
            .with("Action", "Login")
            .with("ActionID", action_id.as_str())
            .with("Username", username)
            .with("Secret", secret)
            .with("Events", "on");

        self.framed.send(action).await?;
        debug!("Login sent to {} as {}", self.endpoint, username);

        let reply = timeout(limit, self.await_reply(&action_id))
            .await
            .map_err(|_| BridgeError::HandshakeTimeout(limit))??;

        if reply.is_success() {
            info!("✅ Authenticated to AMI: {}", self.endpoint);
            Ok(())
        } else {
            let reason = reply.message().unwrap_or("login rejected").to_string();
            Err(BridgeError::Authentication(reason))
        }
    }

    async fn await_reply(&mut self, action_id: &str) -> Result<RawBlock, BridgeError> {
        while let Some(block) = self.framed.next().await {
            let block = block?;

            let matches_action = block.action_id().map_or(true, |id| id == action_id);
            if block.response().is_some() && matches_action {
                return Ok(block);
            }

            debug!("Ignoring {} while waiting for login reply", block);
        }

        Err(BridgeError::Closed)
    }

    /// Split an authenticated connection into its read and write halves.
    pub fn into_split(self) -> (BlockSink<S>, BlockStream<S>) {
        self.framed.split()
    }
}

/// Best-effort `Logoff` before dropping the write half.
pub async fn logoff<S>(sink: &mut BlockSink<S>, limit: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let action = RawBlock::new().with("Action", "Logoff");

    let result = timeout(limit, async {
        sink.send(action).await?;
        sink.close().await
    })
    .await;

    match result {
        Ok(Ok(())) => debug!("Logoff sent"),
        Ok(Err(e)) => warn!("Failed to send Logoff: {}", e),
        Err(_) => warn!("Logoff timed out after {:?}", limit),
    }
}

/// Pump blocks from the socket into the router queue until the stream
/// ends, fails, or `shutdown` fires.
pub async fn read_blocks<S>(
    mut stream: BlockStream<S>,
    blocks: mpsc::Sender<RawBlock>,
    shutdown: CancellationToken,
) -> Result<(), BridgeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(block)) => {
                if blocks.send(block).await.is_err() {
                    return Err(BridgeError::PipelineClosed);
                }
            }
            Some(Err(e)) => return Err(BridgeError::Io(e)),
            None => return Err(BridgeError::Closed),
        }
    }
}
