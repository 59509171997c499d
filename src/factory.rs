// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Channel Factory
//!
//! Owns the consumer side of the exchange: opens the connection, configures QoS,
//! declares the topology, and runs the consume loop. Each delivery goes through
//! the [`MessageHandler`] and its [`Outcome`] is translated into exactly one
//! broker call:
//!
//! | Outcome              | Broker call                 | Loop     |
//! |----------------------|-----------------------------|----------|
//! | `Ack`                | `ack`                       | continue |
//! | `Nack`               | `nack(requeue = true)`      | continue |
//! | `Reject`             | `reject(requeue = false)`   | continue |
//! | `RejectAndTerminate` | `reject(requeue = false)`   | stop     |
//!
//! Deliveries are processed one at a time, in broker order, so dispositions are
//! issued in the order the deliveries arrived.

use crate::{
    channel::{new_amqp_channel, Acknowledge, PublishChannel},
    config::ExchangeConfig,
    document::DocumentFactory,
    envelope::Envelope,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    handler::MessageHandler,
    otel,
    outcome::{Flow, Outcome},
    queue::{QueueBinding, QueueDefinition},
    topology::{AmqpTopology, Topology},
};
use async_trait::async_trait;
use futures_util::{pin_mut, Stream, StreamExt};
use lapin::{
    message::Delivery,
    options::{BasicCancelOptions, BasicConsumeOptions, BasicQosOptions},
    types::FieldTable,
    Channel,
};
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{Span, Status},
};
use std::{borrow::Cow, sync::Arc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name of the consumer connection in the broker management UI
pub const CONNECTION_NAME: &str = "rabbitmq-exchange";

/// Notified when the consuming channel opens and before it is closed.
#[async_trait]
pub trait ChannelListener: Send + Sync {
    async fn channel_created(&self, channel: Arc<dyn PublishChannel>);

    async fn channel_closed(&self) {}
}

/// A delivery as seen by the consume loop.
pub trait InboundDelivery: Send + Sync {
    fn envelope(&self) -> Envelope;

    fn acker(&self) -> &dyn Acknowledge;
}

impl InboundDelivery for Delivery {
    fn envelope(&self) -> Envelope {
        Envelope::from(self)
    }

    fn acker(&self) -> &dyn Acknowledge {
        &self.acker
    }
}

/// Why the consume loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeExit {
    /// A handler asked to stop with `RejectAndTerminate`
    Terminated,
    /// The configured message ceiling was reached
    LimitReached,
    /// The broker closed the delivery stream
    StreamClosed,
}

/// Issues the broker call for an outcome.
///
/// # Returns
/// Whether the consume loop should keep going
pub async fn dispose(outcome: Outcome, acker: &dyn Acknowledge) -> Result<Flow, AmqpError> {
    match outcome {
        Outcome::Ack => {
            acker.ack().await?;
            Ok(Flow::Continue)
        }
        Outcome::Nack => {
            acker.nack(true).await?;
            Ok(Flow::Continue)
        }
        Outcome::Reject => {
            acker.reject(false).await?;
            Ok(Flow::Continue)
        }
        Outcome::RejectAndTerminate => {
            acker.reject(false).await?;
            Ok(Flow::Stop)
        }
    }
}

pub struct ChannelFactory<F>
where
    F: DocumentFactory,
{
    cfg: ExchangeConfig,
    handler: MessageHandler<F>,
    listeners: Vec<Arc<dyn ChannelListener>>,
    tracer: BoxedTracer,
}

impl<F> ChannelFactory<F>
where
    F: DocumentFactory,
{
    pub fn new(cfg: ExchangeConfig, handler: MessageHandler<F>) -> Self {
        ChannelFactory {
            cfg,
            handler,
            listeners: vec![],
            tracer: global::tracer("amqp consumer"),
        }
    }

    pub fn listener(mut self, listener: Arc<dyn ChannelListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Durable topic exchange, created if absent.
    pub fn exchange_definition(&self) -> ExchangeDefinition {
        ExchangeDefinition::new(&self.cfg.exchange).topic().durable()
    }

    /// Durable queue when a name is configured, generated auto-delete queue otherwise.
    pub fn queue_definition(&self) -> QueueDefinition {
        let def = match &self.cfg.queue {
            Some(name) => QueueDefinition::new(name).durable(),
            None => QueueDefinition::generated(&self.cfg.queue_prefix),
        };

        match &self.cfg.dead_letter_exchange {
            Some(exchange) => def.dead_letter_exchange(exchange),
            None => def,
        }
    }

    pub fn bindings(&self, queue: &str) -> Vec<QueueBinding> {
        self.cfg
            .bindings()
            .iter()
            .map(|key| {
                QueueBinding::new(queue)
                    .exchange(&self.cfg.exchange)
                    .routing_key(key)
            })
            .collect()
    }

    /// Connects, consumes until stopped, and closes the connection.
    pub async fn run(&self) -> Result<ConsumeExit, AmqpError> {
        let (conn, channel) =
            new_amqp_channel(&self.cfg.connection, CONNECTION_NAME, self.cfg.heartbeat).await?;

        let result = self.consume(&channel).await;
        self.withdraw().await;

        if let Err(err) = conn.close(200, "consumer stopped").await {
            warn!(error = err.to_string(), "failure to close the connection");
        }

        result
    }

    async fn consume(&self, channel: &Arc<Channel>) -> Result<ConsumeExit, AmqpError> {
        if let Err(err) = channel
            .basic_qos(self.cfg.prefetch_count, BasicQosOptions { global: false })
            .await
        {
            error!(error = err.to_string(), "failure to configure qos");
            return Err(AmqpError::QoSDeclarationError(err.to_string()));
        }

        self.announce(channel.clone()).await;

        let queue = self.queue_definition();
        let queue_name = queue.name().to_owned();

        let mut topology = AmqpTopology::new(channel.clone())
            .exchange(self.exchange_definition())
            .queue(queue);
        for binding in self.bindings(&queue_name) {
            topology = topology.queue_binding(binding);
        }
        topology.install().await?;

        let consumer_tag = format!("{}-{}", CONNECTION_NAME, Uuid::new_v4().simple());
        let consumer = match channel
            .basic_consume(
                &queue_name,
                &consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::BindingConsumerError(queue_name.clone()))
            }
            Ok(c) => Ok(c),
        }?;

        info!(queue = queue_name.as_str(), "consuming messages");

        let result = self
            .drive(consumer.map(|delivery| {
                delivery.map_err(|err| AmqpError::ConsumerError(err.to_string()))
            }))
            .await;

        if let Err(err) = channel
            .basic_cancel(&consumer_tag, BasicCancelOptions::default())
            .await
        {
            warn!(error = err.to_string(), "failure to cancel the consumer");
        }

        result
    }

    async fn announce(&self, channel: Arc<dyn PublishChannel>) {
        for listener in &self.listeners {
            listener.channel_created(channel.clone()).await;
        }
    }

    async fn withdraw(&self) {
        for listener in &self.listeners {
            listener.channel_closed().await;
        }
    }

    /// Runs the consume loop over a stream of deliveries.
    ///
    /// Stops on `RejectAndTerminate`, on the message ceiling, at the end of the
    /// stream, or with an error when a delivery can not be read, handled or
    /// acknowledged.
    pub async fn drive<S, M>(&self, deliveries: S) -> Result<ConsumeExit, AmqpError>
    where
        S: Stream<Item = Result<M, AmqpError>>,
        M: InboundDelivery,
    {
        pin_mut!(deliveries);
        let mut consumed: u64 = 0;

        while let Some(result) = deliveries.next().await {
            let delivery = result.inspect_err(|err| {
                error!(error = err.to_string(), "errors consume msg");
            })?;

            let envelope = delivery.envelope();
            let (_ctx, mut span) =
                otel::new_span(envelope.headers(), &self.tracer, envelope.routing_key());

            debug!(routing_key = envelope.routing_key(), "received message");

            let outcome = match self.handler.handle(&envelope).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    span.record_error(&err);
                    span.set_status(Status::Error {
                        description: Cow::from("consumer terminated"),
                    });
                    return Err(err);
                }
            };

            match outcome {
                Outcome::Ack | Outcome::Nack => span.set_status(Status::Ok),
                Outcome::Reject | Outcome::RejectAndTerminate => span.set_status(Status::Error {
                    description: Cow::from("message rejected"),
                }),
            }

            let flow = dispose(outcome, delivery.acker()).await?;
            consumed += 1;

            if flow == Flow::Stop {
                info!(consumed = consumed, "consumer terminated by message handler");
                return Ok(ConsumeExit::Terminated);
            }

            if self.cfg.max_messages.is_some_and(|max| consumed >= max) {
                info!(consumed = consumed, "consumed messages limit reached");
                return Ok(ConsumeExit::LimitReached);
            }
        }

        warn!(consumed = consumed, "delivery stream closed");
        Ok(ConsumeExit::StreamClosed)
    }
}
