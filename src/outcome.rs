// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use crate::errors::AmqpError;
use std::fmt;

/// Verdict of the message handler on a single delivery.
///
/// Each outcome maps to exactly one broker disposition:
/// - `Ack`: acknowledge
/// - `Nack`: negative-acknowledge, the broker requeues the message
/// - `Reject`: reject without requeue, the message is discarded or dead-lettered
/// - `RejectAndTerminate`: like `Reject`, then stop consuming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ack,
    Nack,
    Reject,
    RejectAndTerminate,
}

impl Outcome {
    pub fn code(&self) -> u8 {
        match self {
            Outcome::Ack => 1,
            Outcome::Nack => 2,
            Outcome::Reject => 3,
            Outcome::RejectAndTerminate => 4,
        }
    }
}

impl TryFrom<u8> for Outcome {
    type Error = AmqpError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Outcome::Ack),
            2 => Ok(Outcome::Nack),
            3 => Ok(Outcome::Reject),
            4 => Ok(Outcome::RejectAndTerminate),
            other => Err(AmqpError::UnknownOutcome(other)),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ack => f.write_str("ack"),
            Outcome::Nack => f.write_str("nack"),
            Outcome::Reject => f.write_str("reject"),
            Outcome::RejectAndTerminate => f.write_str("reject-and-terminate"),
        }
    }
}

/// Whether the consume loop keeps going after a disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}
