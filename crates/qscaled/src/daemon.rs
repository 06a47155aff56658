//! Daemon assembly: backends, autoscaler loop, status server, shutdown.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use qscale_autoscale::{Autoscaler, Controller, Sampler};
use qscale_backends::{CloudFoundryClient, HttpClient, RabbitMqManagement, TlsConfig};
use qscale_core::config::ScalerConfig;
use qscale_core::{PlatformClient, QscaleConfig, QueueBackend};
use qscale_metrics::{FanoutSink, TickRecorder, TickSink, TracingSink};

use crate::api;

/// Wire a sampler and controller for the configured queue/application pair.
pub fn build_autoscaler(
    scaler: &ScalerConfig,
    queue: Arc<dyn QueueBackend>,
    platform: Arc<dyn PlatformClient>,
    sink: Arc<dyn TickSink>,
) -> Autoscaler {
    Autoscaler::new(
        Sampler::new(queue, scaler.queue_name.clone()),
        Controller::new(
            platform,
            sink,
            scaler.application_name.clone(),
            scaler.threshold,
        ),
        scaler.poll_interval(),
    )
}

/// Run until Ctrl-C or SIGTERM.
pub async fn run(config: QscaleConfig) -> anyhow::Result<()> {
    run_until(config, shutdown_signal()).await
}

/// Run until `shutdown` resolves. The tick in flight at that moment is
/// allowed to finish.
pub async fn run_until(
    config: QscaleConfig,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    info!(
        queue = %config.scaler.queue_name,
        application = %config.scaler.application_name,
        "queuescale daemon starting"
    );

    // ── Backends ───────────────────────────────────────────────

    let broker_http = HttpClient::new(TlsConfig::new(false)?, config.http.timeout());
    let queue = Arc::new(RabbitMqManagement::new(broker_http, &config.rabbitmq));
    info!(url = %config.rabbitmq.management_url, vhost = %config.rabbitmq.vhost, "queue backend initialized");

    if config.platform.skip_ssl_validation {
        warn!(api = %config.platform.api, "platform TLS certificate validation is disabled");
    }
    let platform_http = HttpClient::new(
        TlsConfig::new(config.platform.skip_ssl_validation)?,
        config.http.timeout(),
    );
    let platform = Arc::new(CloudFoundryClient::new(platform_http, &config.platform));
    info!(api = %config.platform.api, "platform client initialized");

    // ── Sinks ──────────────────────────────────────────────────

    let recorder = Arc::new(TickRecorder::new(
        config.scaler.queue_name.clone(),
        config.scaler.application_name.clone(),
    ));
    let sink = Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(recorder.clone()),
    );

    let autoscaler = build_autoscaler(&config.scaler, queue, platform, sink);

    // Bound before anything is spawned so a taken port fails startup cleanly.
    let status = match config.server.listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding status server to {addr}"))?;
            info!(%addr, "status server listening");
            Some((listener, api::build_router(recorder)))
        }
        None => None,
    };

    supervise(autoscaler, status, shutdown).await?;

    info!("queuescale daemon stopped");
    Ok(())
}

/// Run the autoscaler, and the status server if given, until `shutdown`
/// resolves.
///
/// A control loop that ends on its own (a panic inside a tick) stops the
/// status server too and is returned as an error, so the process never
/// keeps answering health checks without a loop behind it.
pub async fn supervise(
    autoscaler: Autoscaler,
    status: Option<(TcpListener, Router)>,
    shutdown: impl Future<Output = ()> + Send,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let autoscale_shutdown = shutdown_rx.clone();

    let mut autoscale_handle = tokio::spawn(async move {
        autoscaler.run(autoscale_shutdown).await;
    });

    let server_handle = status.map(|(listener, router)| {
        let mut server_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
        })
    });

    let early_exit = tokio::select! {
        _ = shutdown => None,
        joined = &mut autoscale_handle => Some(joined),
    };
    let _ = shutdown_tx.send(true);

    let loop_result = match early_exit {
        None => {
            info!("shutdown signal received");
            autoscale_handle.await.context("autoscaler task failed")
        }
        Some(Ok(())) => Err(anyhow!("autoscaler loop exited before shutdown")),
        Some(Err(err)) => Err(anyhow::Error::new(err).context("autoscaler task failed")),
    };
    if let Err(err) = &loop_result {
        error!("control loop stopped: {err:#}");
    }

    if let Some(handle) = server_handle {
        handle.await??;
    }
    loop_result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
