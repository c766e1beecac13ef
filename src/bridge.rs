//! Wires the AMI supervisor, router, sweeper and delivery worker together.
//!
//! ```text
//! AmiClient ─> reader task ─> [blocks] ─> EventRouter ─> [events] ─> delivery worker
//!                                              │
//!                                    ConversationTable <── sweeper
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ami::{AmiClient, ConnectionState, SupervisorSettings};
use crate::config::Config;
use crate::delivery::{run_delivery_worker, Notifier};
use crate::error::BridgeError;
use crate::survey::{run_sweeper, ConversationTable, EventRouter};

/// How long background tasks get to finish after shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Bridge {
    config: Config,
    notifier: Arc<dyn Notifier>,
    table: Arc<ConversationTable>,
}

impl Bridge {
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            notifier,
            table: Arc::new(ConversationTable::new()),
        }
    }

    pub fn table(&self) -> Arc<ConversationTable> {
        self.table.clone()
    }

    /// Spawn every task and return a handle to the running bridge.
    pub fn start(self) -> RunningBridge {
        let config = self.config;
        let shutdown = CancellationToken::new();

        let (block_tx, block_rx) = mpsc::channel(config.block_queue_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.delivery_queue_capacity);

        let worker = tokio::spawn(run_delivery_worker(self.notifier, event_rx));

        let router = EventRouter::new(config.survey_extension.clone(), self.table.clone(), event_tx);
        let router = tokio::spawn(router.run(block_rx, shutdown.clone()));

        let sweeper = tokio::spawn(run_sweeper(
            self.table.clone(),
            config.conversation_ttl,
            config.sweep_interval,
            shutdown.clone(),
        ));

        let client = AmiClient::new(
            SupervisorSettings {
                server: config.ami.clone(),
                reconnect_delay: config.reconnect_delay,
                handshake_timeout: config.handshake_timeout,
                fail_fast_on_auth: config.fail_fast_on_auth,
            },
            block_tx,
            shutdown.clone(),
        );
        let state = client.subscribe();
        let supervisor = tokio::spawn(async move { client.run().await });

        info!(
            "✅ Survey bridge started for extension {} → {}",
            config.survey_extension, config.receiver_base_url
        );

        RunningBridge {
            shutdown,
            state,
            table: self.table,
            supervisor,
            tasks: vec![router, sweeper, worker],
        }
    }
}

pub struct RunningBridge {
    shutdown: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    table: Arc<ConversationTable>,
    supervisor: JoinHandle<Result<(), BridgeError>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningBridge {
    /// Watch the AMI session state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn table(&self) -> Arc<ConversationTable> {
        self.table.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown and wait for every task.
    pub async fn shutdown(self) -> Result<(), BridgeError> {
        self.shutdown.cancel();
        self.wait().await
    }

    /// Wait for the supervisor to stop, then stop the rest.
    pub async fn wait(self) -> Result<(), BridgeError> {
        let result = match self.supervisor.await {
            Ok(result) => result,
            Err(e) => Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                e,
            ))),
        };

        self.shutdown.cancel();
        let drain = futures::future::join_all(self.tasks);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!("Shutdown timed out after {:?}, pending deliveries dropped", SHUTDOWN_TIMEOUT);
        }

        info!("Survey bridge stopped");
        result
    }
}
