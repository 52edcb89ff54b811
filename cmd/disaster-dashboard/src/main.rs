//! # Disaster Dashboard Binary
//!
//! Loads configuration, wires transport, interceptor chain, credentials and
//! the live channel together, then serves the dashboard.

use anyhow::{bail, Context};
use api_adapters::web::{router, AppState};
use api_adapters::GatewayMetrics;
use auth_adapters::{BearerTokenCredentials, RoleLabelCredentials};
use configs::{CredentialsConfig, CredentialsMode, DashboardConfig, LogConfig, PushConfig};
use domains::CredentialProvider;
use services::{
    DisasterGateway, FallbackInterceptor, LiveUpdates, LoggingInterceptor, MiddlewareChain,
    ReconnectPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transport_adapters::{ReqwestTransport, SocketIoChannel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = DashboardConfig::load().context("loading configuration")?;
    init_tracing(&config.log);

    let transport = ReqwestTransport::new(config.api.base_url.as_str(), config.api.timeout())
        .context("building HTTP client")?;
    let credentials = credentials(&mut config.credentials)?;
    let metrics = Arc::new(GatewayMetrics::new());

    let mut chain = MiddlewareChain::new()
        .with(LoggingInterceptor)
        .with(metrics.interceptor());
    if config.fallback.enabled {
        chain = chain.with(
            FallbackInterceptor::demo()
                .with_latency(Duration::from_millis(config.fallback.latency_ms)),
        );
    } else {
        info!("demo fallback disabled; API failures surface as errors");
    }
    let gateway = Arc::new(DisasterGateway::new(Arc::new(transport), chain, credentials));

    let live = live_updates(&config.push)?;
    let app = router(AppState {
        gateway,
        live: live.clone(),
        metrics,
    });

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, api = %config.api.base_url, "disaster dashboard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving dashboard")?;

    if let Some(live) = live {
        live.close();
    }
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn credentials(config: &mut CredentialsConfig) -> anyhow::Result<Arc<dyn CredentialProvider>> {
    match config.mode {
        CredentialsMode::Label => Ok(Arc::new(RoleLabelCredentials::new(
            config.contributor_label.as_str(),
            config.admin_label.as_str(),
        ))),
        CredentialsMode::Token => {
            let (Some(contributor), Some(admin)) =
                (config.contributor_token.take(), config.admin_token.take())
            else {
                bail!("token credentials require both contributor and admin tokens");
            };
            Ok(Arc::new(BearerTokenCredentials::new(contributor, admin)))
        }
    }
}

fn live_updates(push: &PushConfig) -> anyhow::Result<Option<LiveUpdates>> {
    let Some(url) = push.url.as_deref() else {
        info!("no push url configured; live updates disabled");
        return Ok(None);
    };
    let channel = SocketIoChannel::new(url, Duration::from_millis(push.connect_timeout_ms))
        .context("configuring push channel")?;
    info!(url = %channel.url(), "live updates enabled");
    let live = LiveUpdates::new(
        Arc::new(channel),
        ReconnectPolicy {
            connect_delay: Duration::from_millis(push.connect_delay_ms),
            max_attempts: push.reconnect_attempts,
            backoff: Duration::from_millis(push.reconnect_delay_ms),
        },
    );
    live.start();
    Ok(Some(live))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
