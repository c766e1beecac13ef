//! HTTP client for the survey receiver
//!
//! Each event becomes one JSON POST. The receiver exposes one endpoint per
//! event kind under a common base URL.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::DeliveryError;
use crate::survey::DomainEvent;

pub const AGENT_START_PATH: &str = "/agent_start";
pub const CUSTOMER_JOIN_PATH: &str = "/customer_join";
pub const RATE_PATH: &str = "/rate";

/// Sends one domain event somewhere.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &DomainEvent) -> Result<(), DeliveryError>;
}

/// JSON body of a notification
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NotificationBody<'a> {
    AgentStart {
        conversation_id: &'a str,
        agent_extension: &'a str,
    },
    CustomerJoin {
        conversation_id: &'a str,
        customer_id: &'a str,
    },
    Rate {
        conversation_id: &'a str,
        rate: &'a str,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub struct Notification<'a> {
    pub path: &'static str,
    pub body: NotificationBody<'a>,
}

impl<'a> From<&'a DomainEvent> for Notification<'a> {
    fn from(event: &'a DomainEvent) -> Self {
        match event {
            DomainEvent::AgentStart {
                conversation_id,
                agent_extension,
            } => Notification {
                path: AGENT_START_PATH,
                body: NotificationBody::AgentStart {
                    conversation_id,
                    agent_extension,
                },
            },
            DomainEvent::CustomerJoin {
                conversation_id,
                customer_id,
            } => Notification {
                path: CUSTOMER_JOIN_PATH,
                body: NotificationBody::CustomerJoin {
                    conversation_id,
                    customer_id,
                },
            },
            DomainEvent::DigitPressed {
                conversation_id,
                digit,
            } => Notification {
                path: RATE_PATH,
                body: NotificationBody::Rate {
                    conversation_id,
                    rate: digit,
                },
            },
        }
    }
}

pub struct DeliveryClient {
    http_client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl DeliveryClient {
    /// Create a client posting under `base_url` (e.g. "http://10.0.0.5:8000").
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        Url::parse(base_url).map_err(|e| DeliveryError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http_client = ClientBuilder::new()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| DeliveryError::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Notifier for DeliveryClient {
    #[instrument(skip(self, event), fields(conversation_id = %event.conversation_id(), kind = event.kind()))]
    async fn notify(&self, event: &DomainEvent) -> Result<(), DeliveryError> {
        let notification = Notification::from(event);
        let url = self.endpoint(notification.path);

        let response = self
            .http_client
            .post(&url)
            .json(&notification.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout_ms)
                } else {
                    DeliveryError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::HttpError(status.as_u16()));
        }

        debug!("Delivered to {}: status={}", url, status);
        Ok(())
    }
}
