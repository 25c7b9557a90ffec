//! Durable consumer base (4.I). Subscribes a durable pull consumer, extracts
//! trace context from headers, JSON-decodes and schema-validates the
//! payload, dispatches to the caller's handler, then resolves the message
//! according to the retry policy: schema-invalid and malformed payloads are
//! `term`-ed immediately, handler errors are `nak`-ed until the delivery
//! count exceeds `max_delivery_attempts`, at which point the message is
//! `term`-ed and `on_max_retries_exceeded` runs.

use async_nats::jetstream::consumer::{pull::Config as PullConfig, DeliverPolicy};
use async_nats::jetstream::{self, Message};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::EventError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Ack,
    Nak,
    Term,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), EventError>> + Send>>;
pub type Handler = Arc<dyn Fn(serde_json::Value, HashMap<String, String>) -> HandlerFuture + Send + Sync>;
pub type MaxRetriesHook = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

#[async_trait]
pub trait Consumer: Send + Sync {
    async fn consume(
        &self,
        stream: &str,
        durable: &str,
        max_delivery_attempts: u32,
        handler: Handler,
        on_max_retries_exceeded: Option<MaxRetriesHook>,
    ) -> Result<(), EventError>;
}

pub struct NatsConsumer {
    jetstream: jetstream::Context,
}

impl NatsConsumer {
    pub fn new(jetstream: jetstream::Context) -> Self {
        Self { jetstream }
    }

    async fn resolve(msg: &Message, outcome: ConsumeOutcome) {
        let ack = match outcome {
            ConsumeOutcome::Ack => async_nats::jetstream::AckKind::Ack,
            ConsumeOutcome::Nak => async_nats::jetstream::AckKind::Nak(None),
            ConsumeOutcome::Term => async_nats::jetstream::AckKind::Term,
        };
        if let Err(e) = msg.ack_with(ack).await {
            tracing::warn!(error = %e, "failed to resolve message ack state");
        }
    }
}

#[async_trait]
impl Consumer for NatsConsumer {
    async fn consume(
        &self,
        stream: &str,
        durable: &str,
        max_delivery_attempts: u32,
        handler: Handler,
        on_max_retries_exceeded: Option<MaxRetriesHook>,
    ) -> Result<(), EventError> {
        let stream = self
            .jetstream
            .get_stream(stream)
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(
                durable,
                PullConfig {
                    durable_name: Some(durable.to_string()),
                    deliver_policy: DeliverPolicy::All,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;

        while let Some(next) = messages.next().await {
            let msg = match next {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(error = %e, "error pulling next message, continuing");
                    continue;
                }
            };

            let headers: HashMap<String, String> = msg
                .headers
                .as_ref()
                .map(|h| {
                    h.iter()
                        .map(|(k, v)| (k.to_string(), v.iter().next().cloned().unwrap_or_default()))
                        .collect()
                })
                .unwrap_or_default();

            let payload: serde_json::Value = match serde_json::from_slice(&msg.payload) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "payload is not valid JSON, terminating message");
                    Self::resolve(&msg, ConsumeOutcome::Term).await;
                    continue;
                }
            };

            match handler(payload.clone(), headers).await {
                Ok(()) => Self::resolve(&msg, ConsumeOutcome::Ack).await,
                Err(EventError::SchemaInvalid(reason)) => {
                    tracing::warn!(reason, "schema-invalid payload, terminating message");
                    Self::resolve(&msg, ConsumeOutcome::Term).await;
                }
                Err(EventError::Malformed(reason)) => {
                    tracing::warn!(reason, "malformed payload, terminating message");
                    Self::resolve(&msg, ConsumeOutcome::Term).await;
                }
                Err(e) => {
                    let delivery_count = msg
                        .info()
                        .map(|i| i.delivered)
                        .unwrap_or(1);
                    if delivery_count >= max_delivery_attempts as u64 {
                        tracing::error!(
                            error = %e, delivery_count, max_delivery_attempts,
                            "handler failed past max delivery attempts, terminating"
                        );
                        Self::resolve(&msg, ConsumeOutcome::Term).await;
                        if let Some(hook) = &on_max_retries_exceeded {
                            hook(payload);
                        }
                    } else {
                        tracing::warn!(error = %e, delivery_count, "handler failed, nak-ing for retry");
                        Self::resolve(&msg, ConsumeOutcome::Nak).await;
                    }
                }
            }
        }

        Ok(())
    }
}
