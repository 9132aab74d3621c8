use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use statistics_service::channel::{EventChannel, KafkaChannel, KafkaChannelConfig};
use statistics_service::config::{Config, StoreBackend};
use statistics_service::handlers;
use statistics_service::services::{
    spawn_consumers, ChannelDeadLetterSink, DeadLetterSink, InteractionConsumerConfig,
    LogDeadLetterSink, StatisticsQuery,
};
use statistics_service::store::{
    AggregateStore, ClickHouseAggregateStore, ClickHouseStoreConfig, MemoryAggregateStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,statistics_service=debug".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.app.log_format);

    info!(
        env = %config.app.env,
        http_port = config.app.http_port,
        store = ?config.app.store,
        "Starting statistics-service"
    );

    // Aggregate store
    let store: Arc<dyn AggregateStore> = match config.app.store {
        StoreBackend::ClickHouse => {
            let ch = ClickHouseAggregateStore::new(&ClickHouseStoreConfig::from(&config.clickhouse));
            ch.health_check()
                .await
                .context("ClickHouse is not reachable")?;
            Arc::new(ch)
        }
        StoreBackend::Memory => {
            warn!("Using in-memory aggregate store; statistics are lost on restart");
            Arc::new(MemoryAggregateStore::new())
        }
    };

    if config.clickhouse.reset_on_start {
        store
            .initialize()
            .await
            .context("Failed to initialize aggregate tables")?;
        info!("Aggregate tables initialized");
    }

    // Channel
    let channel: Arc<dyn EventChannel> = Arc::new(
        KafkaChannel::new(KafkaChannelConfig::from(&config.kafka))
            .context("Failed to create Kafka channel")?,
    );

    let dead_letters: Arc<dyn DeadLetterSink> = match &config.kafka.dead_letter_topic {
        Some(topic) => {
            info!(topic = %topic, "Dropped events go to dead-letter topic");
            Arc::new(ChannelDeadLetterSink::new(Arc::clone(&channel), topic.clone()))
        }
        None => Arc::new(LogDeadLetterSink),
    };

    // Consumers, one per event kind
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_config = InteractionConsumerConfig {
        group_id: config.kafka.group_id.clone(),
        likes_topic: config.kafka.likes_topic.clone(),
        views_topic: config.kafka.views_topic.clone(),
        retry_backoff: Duration::from_millis(config.consumer.retry_backoff_ms),
    };

    let consumers = spawn_consumers(
        channel.as_ref(),
        &consumer_config,
        Arc::clone(&store),
        dead_letters,
        shutdown_rx,
    )
    .await
    .context("Failed to start consumers")?;

    // HTTP server
    let query = web::Data::new(StatisticsQuery::new(
        Arc::clone(&store),
        config.query.clone(),
    ));

    info!("Starting HTTP server on {}:{}", config.app.host, config.app.http_port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(query.clone())
            .configure(handlers::configure)
    })
    .bind((config.app.host.as_str(), config.app.http_port))
    .context("Failed to bind HTTP server")?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    server_handle.stop(true).await;

    for (kind, handle) in consumers {
        match handle.await {
            Ok(report) => info!(kind = %kind, report = ?report, "Consumer finished"),
            Err(e) => error!(kind = %kind, error = %e, "Consumer task failed"),
        }
    }

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }

    info!("statistics-service stopped");
    Ok(())
}
