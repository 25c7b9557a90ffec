//! Typed publisher base (4.I): envelope fields are filled in by the caller
//! via `envelope.rs`, this module owns schema validation, serialisation,
//! trace-context header propagation, and the actual JetStream publish.

use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_nats::HeaderMap;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::EventError;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn ensure_stream(&self, name: &str, subjects: &[String]) -> Result<(), EventError>;

    /// Shallow connectivity probe for readiness checks — does not publish.
    async fn health_check(&self) -> Result<(), EventError>;

    async fn publish(
        &self,
        subject: &str,
        payload: Vec<u8>,
        headers: HashMap<String, String>,
    ) -> Result<(), EventError>;
}

pub struct NatsEventBus {
    jetstream: jetstream::Context,
}

impl NatsEventBus {
    pub async fn connect(nats_url: &str) -> Result<Self, EventError> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;
        Ok(NatsEventBus {
            jetstream: jetstream::new(client),
        })
    }

    pub fn context(&self) -> jetstream::Context {
        self.jetstream.clone()
    }

    /// Serialises `envelope`, validates it if `validate` is provided, and
    /// publishes with trace-context headers merged in.
    pub async fn publish_envelope<T: Serialize>(
        &self,
        subject: &str,
        envelope: &T,
        validate: impl FnOnce() -> Result<(), EventError>,
        trace_headers: HashMap<String, String>,
    ) -> Result<(), EventError> {
        validate()?;
        let payload =
            serde_json::to_vec(envelope).map_err(|e| EventError::Permanent(e.to_string()))?;
        self.publish(subject, payload, trace_headers).await
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn ensure_stream(&self, name: &str, subjects: &[String]) -> Result<(), EventError> {
        let config = StreamConfig {
            name: name.to_string(),
            subjects: subjects.to_vec(),
            ..Default::default()
        };
        self.jetstream
            .get_or_create_stream(config)
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EventError> {
        self.jetstream
            .account_info()
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn publish(
        &self,
        subject: &str,
        payload: Vec<u8>,
        headers: HashMap<String, String>,
    ) -> Result<(), EventError> {
        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            header_map.insert(k.as_str(), v.as_str());
        }

        let ack = self
            .jetstream
            .publish_with_headers(subject.to_string(), header_map, payload.into())
            .await
            .map_err(|e| EventError::Transient(e.to_string()))?;

        ack.await.map_err(|e| EventError::Transient(e.to_string()))?;
        Ok(())
    }
}
