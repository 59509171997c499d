// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use async_trait::async_trait;
use rabbitmq_exchange::{
    command::ConsumerCommand,
    config::ExchangeConfig,
    consumer::{Consumer, Consumers},
    document::JsonDocumentFactory,
    errors::ConsumeError,
    factory::ChannelFactory,
    handler::MessageHandler,
    identifier::IdentifierGenerator,
    source::Source,
};
use serde_json::Value;
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_PATH_ENV: &str = "RABBITMQ_CONFIG";

struct LoggingConsumer;

#[async_trait]
impl Consumer<Value> for LoggingConsumer {
    async fn consume(
        &self,
        source: &Source,
        routing_key: &str,
        document: &Value,
    ) -> Result<(), ConsumeError> {
        info!(
            source = source.as_str(),
            routing_key = routing_key,
            document = %document,
            "message consumed"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::var(CONFIG_PATH_ENV).ok();
    let cfg = match ExchangeConfig::load(path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = err.to_string(), "exchange consumer could not start");
            return ExitCode::FAILURE;
        }
    };

    let consumers = match Consumers::<Value>::builder()
        .consumer(Arc::new(LoggingConsumer))
        .build()
    {
        Ok(consumers) => consumers,
        Err(err) => {
            error!(error = err.to_string(), "exchange consumer could not start");
            return ExitCode::FAILURE;
        }
    };

    let handler = MessageHandler::new(
        Arc::new(IdentifierGenerator::new()),
        JsonDocumentFactory::<Value>::new(),
        Arc::new(consumers),
    )
    .self_messages(cfg.self_messages);

    ConsumerCommand::new(ChannelFactory::new(cfg, handler))
        .execute()
        .await
}
