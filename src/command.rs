// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use crate::{
    document::DocumentFactory,
    errors::AmqpError,
    factory::{ChannelFactory, ConsumeExit},
};
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Runs a [`ChannelFactory`] to completion and maps the result to a process exit code.
pub struct ConsumerCommand<F>
where
    F: DocumentFactory,
{
    factory: ChannelFactory<F>,
}

impl<F> ConsumerCommand<F>
where
    F: DocumentFactory,
{
    pub fn new(factory: ChannelFactory<F>) -> Self {
        ConsumerCommand { factory }
    }

    pub async fn execute(&self) -> ExitCode {
        info!("starting exchange consumer");
        ExitCode::from(status(&self.factory.run().await))
    }
}

/// A closed delivery stream means the broker went away, so the supervisor
/// should restart the process.
pub(crate) fn status(result: &Result<ConsumeExit, AmqpError>) -> u8 {
    match result {
        Ok(ConsumeExit::Terminated) | Ok(ConsumeExit::LimitReached) => {
            info!(reason = ?result, "exchange consumer stopped");
            0
        }
        Ok(ConsumeExit::StreamClosed) => {
            warn!("exchange consumer lost its delivery stream");
            1
        }
        Err(err) => {
            error!(error = err.to_string(), "exchange consumer failed");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_stops_exit_cleanly() {
        assert_eq!(status(&Ok(ConsumeExit::Terminated)), 0);
        assert_eq!(status(&Ok(ConsumeExit::LimitReached)), 0);
    }

    #[test]
    fn failures_exit_with_error() {
        assert_eq!(status(&Ok(ConsumeExit::StreamClosed)), 1);
        assert_eq!(status(&Err(AmqpError::ConnectionError)), 1);
        assert_eq!(
            status(&Err(AmqpError::Terminate("disk full".to_owned()))),
            1
        );
    }
}
