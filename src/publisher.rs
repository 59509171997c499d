// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Serializes documents to JSON, tags them with provenance headers and hands
//! them to a [`PublishChannel`]. Until the consumer announces its channel the
//! publisher falls back to a channel of its own, usually a
//! [`LazyChannel`](crate::channel::LazyChannel).

use crate::{
    channel::PublishChannel,
    envelope::{MessageHeaders, AMQP_HEADERS_CREATED, AMQP_HEADERS_SENDER_ID, AMQP_HEADERS_SOURCE},
    errors::AmqpError,
    factory::ChannelListener,
    identifier::IdentifierGenerator,
    otel,
    source::Source,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use opentelemetry::Context;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Source of the `created` timestamp.
pub type Clock = Arc<dyn Fn() -> DateTime<FixedOffset> + Send + Sync>;

pub struct RabbitMQPublisher {
    exchange: String,
    identifier: Arc<IdentifierGenerator>,
    fallback: Arc<dyn PublishChannel>,
    channel: RwLock<Option<Arc<dyn PublishChannel>>>,
    clock: Clock,
}

impl RabbitMQPublisher {
    /// Creates a new RabbitMQ publisher.
    ///
    /// # Parameters
    /// * `exchange` - Exchange every message is published to
    /// * `identifier` - Process identity written into `sender_id`
    /// * `fallback` - Channel used until [`RabbitMQPublisher::set_channel`] is called
    pub fn new(
        exchange: &str,
        identifier: Arc<IdentifierGenerator>,
        fallback: Arc<dyn PublishChannel>,
    ) -> RabbitMQPublisher {
        RabbitMQPublisher {
            exchange: exchange.to_owned(),
            identifier,
            fallback,
            channel: RwLock::new(None),
            clock: Arc::new(|| Local::now().fixed_offset()),
        }
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Switches publishing to the given channel.
    pub async fn set_channel(&self, channel: Arc<dyn PublishChannel>) {
        *self.channel.write().await = Some(channel);
    }

    async fn current_channel(&self) -> Arc<dyn PublishChannel> {
        match self.channel.read().await.as_ref() {
            Some(channel) => channel.clone(),
            None => self.fallback.clone(),
        }
    }

    /// Publishes a document.
    ///
    /// `None` is published as a JSON `null` body. Serialization failures are
    /// logged and returned without touching the broker.
    pub async fn publish<D>(
        &self,
        source: &Source,
        routing_key: &str,
        document: Option<&D>,
    ) -> Result<(), AmqpError>
    where
        D: Serialize + Sync + ?Sized,
    {
        let body = match serde_json::to_vec(&document) {
            Ok(body) => body,
            Err(err) => {
                error!(
                    routing_key = routing_key,
                    source = source.as_str(),
                    error = err.to_string(),
                    "data could not be converted to message"
                );
                return Err(AmqpError::ParsePayloadError);
            }
        };

        let mut headers = MessageHeaders::new();
        otel::inject(&Context::current(), &mut headers);
        headers.insert(
            AMQP_HEADERS_SENDER_ID.to_owned(),
            self.identifier.identifier().to_owned(),
        );
        headers.insert(AMQP_HEADERS_SOURCE.to_owned(), source.as_str().to_owned());
        headers.insert(
            AMQP_HEADERS_CREATED.to_owned(),
            (self.clock)().to_rfc3339_opts(SecondsFormat::Secs, false),
        );

        let result = self
            .current_channel()
            .await
            .publish(&self.exchange, routing_key, &body, &headers)
            .await;

        match result {
            Ok(()) => {
                debug!(
                    routing_key = routing_key,
                    source = source.as_str(),
                    body = %String::from_utf8_lossy(&body),
                    "message was pushed into data exchange"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    routing_key = routing_key,
                    source = source.as_str(),
                    body = %String::from_utf8_lossy(&body),
                    error = err.to_string(),
                    "message could not be pushed into data exchange"
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl ChannelListener for RabbitMQPublisher {
    async fn channel_created(&self, channel: Arc<dyn PublishChannel>) {
        self.set_channel(channel).await;
        debug!("consumer channel was assigned to publisher");
    }

    async fn channel_closed(&self) {
        *self.channel.write().await = None;
        debug!("consumer channel was released, publishing through fallback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::MockPublishChannel,
        handler::tests::{envelope, handler, DeviceUpdated, OWN_ID},
        outcome::Outcome,
        source::ModuleSource,
    };
    use std::{collections::BTreeMap, sync::Mutex};

    #[derive(Serialize)]
    struct Attribute {
        attr: String,
        value: i64,
    }

    fn fixed_clock() -> Clock {
        Arc::new(|| DateTime::parse_from_rfc3339("2026-10-19T12:00:00+02:00").unwrap())
    }

    fn publisher(channel: MockPublishChannel, identifier: &str) -> RabbitMQPublisher {
        RabbitMQPublisher::new(
            "exchange_name",
            Arc::new(IdentifierGenerator::from(identifier)),
            Arc::new(channel),
        )
        .clock(fixed_clock())
    }

    #[tokio::test]
    async fn publishes_json_body_with_provenance_headers() {
        let mut channel = MockPublishChannel::new();
        channel
            .expect_publish()
            .withf(|exchange, routing_key, body, headers| {
                exchange == "exchange_name"
                    && routing_key == "device.updated"
                    && body == &br#"{"attr":"x","value":1}"#[..]
                    && headers.get("sender_id").map(String::as_str) == Some("publisher-proc")
                    && headers.get("source").map(String::as_str) == Some("module.devices")
                    && headers.get("created").map(String::as_str)
                        == Some("2026-10-19T12:00:00+02:00")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let result = publisher(channel, "publisher-proc")
            .publish(
                &Source::Module(ModuleSource::Devices),
                "device.updated",
                Some(&Attribute {
                    attr: "x".to_owned(),
                    value: 1,
                }),
            )
            .await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn default_clock_writes_parsable_timestamp() {
        let mut channel = MockPublishChannel::new();
        channel
            .expect_publish()
            .withf(|_, _, _, headers| {
                headers
                    .get("created")
                    .is_some_and(|created| DateTime::parse_from_rfc3339(created).is_ok())
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let publisher = RabbitMQPublisher::new(
            "exchange_name",
            Arc::new(IdentifierGenerator::new()),
            Arc::new(channel),
        );

        let result = publisher
            .publish(
                &Source::Module(ModuleSource::Devices),
                "device.updated",
                Some(&serde_json::json!({"attr": "x"})),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_document_is_published_as_null() {
        let mut channel = MockPublishChannel::new();
        channel
            .expect_publish()
            .withf(|_, _, body, _| body == &b"null"[..])
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let result = publisher(channel, "publisher-proc")
            .publish::<Attribute>(
                &Source::Module(ModuleSource::Devices),
                "device.deleted",
                None,
            )
            .await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn serialization_failure_never_reaches_broker() {
        let mut channel = MockPublishChannel::new();
        channel.expect_publish().times(0);

        let mut document = BTreeMap::new();
        document.insert((1, 2), "tuple keys are not valid json");

        let result = publisher(channel, "publisher-proc")
            .publish(
                &Source::Module(ModuleSource::Devices),
                "device.updated",
                Some(&document),
            )
            .await;

        assert_eq!(result, Err(AmqpError::ParsePayloadError));
    }

    #[tokio::test]
    async fn broker_failure_is_reported() {
        let mut channel = MockPublishChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(|_, _, _, _| Err(AmqpError::PublishingError));

        let result = publisher(channel, "publisher-proc")
            .publish(
                &Source::Module(ModuleSource::Devices),
                "device.updated",
                Some(&serde_json::json!({})),
            )
            .await;

        assert_eq!(result, Err(AmqpError::PublishingError));
    }

    #[tokio::test]
    async fn switches_from_fallback_to_injected_channel() {
        let mut fallback = MockPublishChannel::new();
        fallback
            .expect_publish()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut injected = MockPublishChannel::new();
        injected
            .expect_publish()
            .times(2)
            .returning(|_, _, _, _| Ok(()));

        let publisher = publisher(fallback, "publisher-proc");
        let source = Source::Module(ModuleSource::Devices);
        let document = serde_json::json!({"value": 1});

        assert!(publisher
            .publish(&source, "device.updated", Some(&document))
            .await
            .is_ok());

        publisher.set_channel(Arc::new(injected)).await;

        for _ in 0..2 {
            assert!(publisher
                .publish(&source, "device.updated", Some(&document))
                .await
                .is_ok());
        }
    }

    #[tokio::test]
    async fn follows_consumer_channel_lifecycle() {
        let mut fallback = MockPublishChannel::new();
        fallback
            .expect_publish()
            .times(2)
            .returning(|_, _, _, _| Ok(()));

        let mut injected = MockPublishChannel::new();
        injected
            .expect_publish()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let publisher = Arc::new(publisher(fallback, "publisher-proc"));
        let listener: Arc<dyn ChannelListener> = publisher.clone();
        let source = Source::Module(ModuleSource::Devices);
        let document = serde_json::json!({"value": 1});

        assert!(publisher
            .publish(&source, "device.updated", Some(&document))
            .await
            .is_ok());

        listener.channel_created(Arc::new(injected)).await;
        assert!(publisher
            .publish(&source, "device.updated", Some(&document))
            .await
            .is_ok());

        listener.channel_closed().await;
        assert!(publisher
            .publish(&source, "device.updated", Some(&document))
            .await
            .is_ok());
    }

    type Captured = Arc<Mutex<Option<(Vec<u8>, MessageHeaders)>>>;

    fn capturing_channel() -> (MockPublishChannel, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let sink = captured.clone();

        let mut channel = MockPublishChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(move |_, _, body, headers| {
                *sink.lock().unwrap() = Some((body.to_vec(), headers.clone()));
                Ok(())
            });

        (channel, captured)
    }

    #[tokio::test]
    async fn published_document_is_reconstructed_by_handler() {
        let (channel, captured) = capturing_channel();
        let document = DeviceUpdated {
            id: "abc".to_owned(),
            value: 10,
        };

        publisher(channel, "publisher-proc")
            .publish(
                &Source::Module(ModuleSource::Devices),
                "device.updated",
                Some(&document),
            )
            .await
            .unwrap();

        let (body, headers) = captured.lock().unwrap().take().unwrap();
        let headers = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<Vec<_>>();

        let (handler, consumer) = handler(Ok(()));
        let outcome = handler
            .handle(&envelope(&headers, std::str::from_utf8(&body).unwrap()))
            .await;

        assert_eq!(outcome, Ok(Outcome::Ack));
        let calls = consumer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Source::Module(ModuleSource::Devices));
        assert_eq!(calls[0].2, document);
    }

    #[tokio::test]
    async fn own_publication_loops_back_as_nack() {
        let (channel, captured) = capturing_channel();

        publisher(channel, OWN_ID)
            .publish(
                &Source::Module(ModuleSource::Devices),
                "device.updated",
                Some(&DeviceUpdated {
                    id: "abc".to_owned(),
                    value: 10,
                }),
            )
            .await
            .unwrap();

        let (body, headers) = captured.lock().unwrap().take().unwrap();
        let headers = headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<Vec<_>>();

        let (handler, consumer) = handler(Ok(()));
        let outcome = handler
            .handle(&envelope(&headers, std::str::from_utf8(&body).unwrap()))
            .await;

        assert_eq!(outcome, Ok(Outcome::Nack));
        assert_eq!(consumer.calls(), 0);
    }
}
