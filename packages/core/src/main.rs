use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use stripe_watch::api;
use stripe_watch::cli::Cli;
use stripe_watch::config::Config;
use stripe_watch::error::AppError;
use stripe_watch::logging::init_logging;
use stripe_watch::metrics::AppMetrics;
use stripe_watch::monitor::MonitorContext;
use stripe_watch::scheduler::Monitor;
use stripe_watch::services::mqtt::MqttTransport;
use stripe_watch::services::stripe::StripeClient;
use stripe_watch::services::AccountProvider;

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::resolve(&cli)?;
    tracing::info!("Service started with config: {:?}", config);

    let provider = StripeClient::new(&config.stripe_api_url, &config.api_key)
        .with_event_limit(config.event_limit);
    provider
        .health_check()
        .await
        .map_err(AppError::Credential)?;
    tracing::info!(provider = provider.provider_name(), "Credential accepted");

    let transport = MqttTransport::new(config.broker.clone(), &config.client_id);
    let metrics = Arc::new(AppMetrics::new()?);

    let ctx = MonitorContext::new(
        config.monitor_settings(),
        Arc::new(provider),
        Arc::new(transport),
        metrics.clone(),
    )
    .with_sink(config.sink());
    let monitor = Monitor::new(ctx);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received. Stopping monitor.");
                    cancel.cancel();
                }
                Err(err) => tracing::error!("Failed to listen for shutdown signal: {}", err),
            }
        }
    });

    let server = match config.metrics_addr {
        Some(addr) => {
            let listener = api::bind(addr).await?;
            let router = api::router(metrics.clone());
            Some(tokio::spawn(api::serve(listener, router, cancel.child_token())))
        }
        None => None,
    };

    let result = monitor.run(cancel.clone()).await;

    // Stops the HTTP surface whether the monitor was cancelled or failed.
    cancel.cancel();
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!("HTTP surface failed: {}", err),
            Err(err) => tracing::error!("HTTP surface task panicked: {}", err),
        }
    }

    result.map_err(AppError::from)
}
