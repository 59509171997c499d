// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handler
//!
//! Turns one inbound envelope into exactly one [`Outcome`]. Every malformed or
//! unprocessable message is resolved here into `Reject`, messages published by
//! this process are resolved according to the [`SelfMessagePolicy`], and only a
//! fatal consumer failure escapes as `AmqpError::Terminate`.
//!
//! The steps, in order:
//! 1. decode the body as JSON
//! 2. require a `source` header and a JSON object payload
//! 3. drop messages whose `sender_id` is this process
//! 4. resolve the source tag
//! 5. build the typed document
//! 6. dispatch to the consumers

use crate::{
    config::SelfMessagePolicy,
    consumer::Consumer,
    document::DocumentFactory,
    envelope::Envelope,
    errors::{AmqpError, ConsumeError},
    identifier::IdentifierGenerator,
    outcome::Outcome,
    source::Source,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Optional instrumentation hooks around message handling.
pub trait HandlerObserver: Send + Sync {
    fn before_handled(&self, _envelope: &Envelope) {}

    /// Called right before a document is dispatched to the consumers.
    fn message_received(&self, _source: &Source, _routing_key: &str) {}

    fn after_handled(&self, _envelope: &Envelope, _outcome: Outcome) {}
}

pub struct MessageHandler<F>
where
    F: DocumentFactory,
{
    identifier: Arc<IdentifierGenerator>,
    documents: F,
    consumers: Arc<dyn Consumer<F::Document>>,
    self_messages: SelfMessagePolicy,
    observer: Option<Arc<dyn HandlerObserver>>,
}

impl<F> MessageHandler<F>
where
    F: DocumentFactory,
{
    pub fn new(
        identifier: Arc<IdentifierGenerator>,
        documents: F,
        consumers: Arc<dyn Consumer<F::Document>>,
    ) -> Self {
        MessageHandler {
            identifier,
            documents,
            consumers,
            self_messages: SelfMessagePolicy::default(),
            observer: None,
        }
    }

    pub fn self_messages(mut self, policy: SelfMessagePolicy) -> Self {
        self.self_messages = policy;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn HandlerObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Handles one envelope.
    ///
    /// # Returns
    /// The outcome for the delivery, or `AmqpError::Terminate` when a consumer
    /// reported a fatal failure and consumption must stop.
    pub async fn handle(&self, envelope: &Envelope) -> Result<Outcome, AmqpError> {
        if let Some(observer) = &self.observer {
            observer.before_handled(envelope);
        }

        let outcome = self.resolve(envelope).await?;

        if let Some(observer) = &self.observer {
            observer.after_handled(envelope, outcome);
        }

        Ok(outcome)
    }

    async fn resolve(&self, envelope: &Envelope) -> Result<Outcome, AmqpError> {
        let routing_key = envelope.routing_key();

        let data = match serde_json::from_slice::<Value>(envelope.body()) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    routing_key = routing_key,
                    error = err.to_string(),
                    "received message is not valid json"
                );
                return Ok(Outcome::Reject);
            }
        };

        let (Some(source), true) = (envelope.source(), data.is_object()) else {
            warn!(
                routing_key = routing_key,
                "received message is not in valid format"
            );
            return Ok(Outcome::Reject);
        };

        if envelope
            .sender_id()
            .is_some_and(|sender| self.identifier.is_own(sender))
        {
            debug!(
                routing_key = routing_key,
                "received message published by itself"
            );
            return Ok(match self.self_messages {
                SelfMessagePolicy::Nack => Outcome::Nack,
                SelfMessagePolicy::Ack => Outcome::Ack,
            });
        }

        let Some(source) = Source::parse(source) else {
            warn!(
                routing_key = routing_key,
                source = source,
                "received message has unknown source"
            );
            return Ok(Outcome::Reject);
        };

        let document = match self.documents.create(&data, routing_key) {
            Ok(document) => document,
            Err(err) => {
                error!(
                    routing_key = routing_key,
                    source = source.as_str(),
                    data = %data,
                    error = err.to_string(),
                    "message could not be transformed into document"
                );
                return Ok(Outcome::Reject);
            }
        };

        if let Some(observer) = &self.observer {
            observer.message_received(&source, routing_key);
        }

        match self.consumers.consume(&source, routing_key, &document).await {
            Ok(()) => Ok(Outcome::Ack),
            Err(ConsumeError::Unprocessable(reason)) => {
                error!(
                    routing_key = routing_key,
                    source = source.as_str(),
                    error = reason.as_str(),
                    "message could not be handled"
                );
                Ok(Outcome::Reject)
            }
            Err(ConsumeError::Terminate(reason)) => {
                error!(
                    routing_key = routing_key,
                    source = source.as_str(),
                    error = reason.as_str(),
                    "consumer failed, terminating"
                );
                Err(AmqpError::Terminate(reason))
            }
        }
    }
}
