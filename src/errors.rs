// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the RabbitMQ Exchange
//!
//! `AmqpError` covers everything that can go wrong while talking to the broker
//! or while running the consume loop. `ConsumeError` is what business consumers
//! report back to the message handler, and `DocumentError` is raised when a
//! decoded payload cannot be turned into a typed document.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Only `Terminate` and the connection-level variants are expected to cross the
/// consume loop boundary; malformed messages are always resolved into an
/// [`Outcome`](crate::outcome::Outcome) before that.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error loading or validating the configuration
    #[error("invalid configuration `{0}`")]
    ConfigError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error binding a consumer to a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error serializing a document into a message body
    #[error("failure to parse payload")]
    ParsePayloadError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error rejecting a message
    #[error("failure to reject message")]
    RejectMessageError,

    /// A numeric outcome code that does not map to any broker disposition
    #[error("unknown message handler outcome `{0}`")]
    UnknownOutcome(u8),

    /// Error reading the delivery stream
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Fatal failure raised while dispatching a message, consumption must stop
    #[error("consumer terminated `{0}`")]
    Terminate(String),
}

/// Errors reported by business consumers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    /// The message is valid but can not be processed; it is rejected and never retried
    #[error("unprocessable message: {0}")]
    Unprocessable(String),

    /// Any failure that must stop the consumer, e.g. a broken connection
    #[error("terminate: {0}")]
    Terminate(String),
}

/// Error raised when a payload can not be turned into a typed document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("document for `{routing_key}` could not be created: {reason}")]
pub struct DocumentError {
    pub routing_key: String,
    pub reason: String,
}

impl DocumentError {
    pub fn new(routing_key: impl Into<String>, reason: impl ToString) -> Self {
        DocumentError {
            routing_key: routing_key.into(),
            reason: reason.to_string(),
        }
    }
}
