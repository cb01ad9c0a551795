//! Subscription Gate service entry point.
//!
//! Wiring: config -> tracing -> database pool -> platform adapters ->
//! handlers -> expiry sweeper task -> axum server with graceful shutdown.

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use subscription_gate::adapters::http::{app_router, GateAppState, GateSettings};
use subscription_gate::adapters::postgres::{self, PgSweepLock, PostgresSubscriptionStore};
use subscription_gate::adapters::scheduler::ExpirySweeperService;
use subscription_gate::adapters::telegram::{
    ContactResolverClient, RetryingPlatform, TelegramConfig, TelegramPlatform,
};
use subscription_gate::config::AppConfig;
use subscription_gate::domain::foundation::GroupId;
use subscription_gate::ports::{Clock, MembershipPlatform, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        group_id = config.platform.group_id,
        "starting subscription gate"
    );

    let pool = postgres::connect(&config.database).await?;
    tracing::info!("connected to database");

    let resolver = config
        .platform
        .resolver_url
        .as_ref()
        .map(|url| ContactResolverClient::new(url.clone(), config.platform.request_timeout()))
        .transpose()?;
    if resolver.is_none() {
        tracing::warn!("no contact resolver configured; new subscriptions cannot be resolved");
    }

    let telegram = Arc::new(TelegramPlatform::new(
        TelegramConfig::new(config.platform.bot_token.clone())
            .with_base_url(config.platform.api_base_url.clone())
            .with_timeout(config.platform.request_timeout()),
        resolver,
    )?);
    let platform: Arc<dyn MembershipPlatform> = Arc::new(RetryingPlatform::new(
        telegram.clone(),
        config.platform.max_flood_retries,
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = GateAppState::new(
        Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        platform,
        Arc::new(PgSweepLock::new(pool.clone())),
        clock.clone(),
        GateSettings {
            group: GroupId::new(config.platform.group_id),
            invite_ttl: config.platform.invite_ttl(),
            announce_chat: config.platform.announce_chat_id.map(GroupId::new),
            bulk_resolve_delay: config.platform.bulk_resolve_delay(),
            webhook_secret: config.platform.webhook_secret.clone(),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_task = if config.sweeper.enabled {
        let sweeper =
            ExpirySweeperService::new(state.sweep.clone(), config.sweeper.schedule()?, clock);
        Some(tokio::spawn(async move { sweeper.run(shutdown_rx).await }))
    } else {
        tracing::warn!("expiry sweeper disabled");
        None
    };

    if let Some(url) = &config.platform.webhook_url {
        telegram
            .set_webhook(url, config.platform.webhook_secret.as_ref())
            .await?;
    }

    let app = app_router(state, config.server.request_timeout());
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "sweeper task ended abnormally");
        }
    }

    if config.platform.webhook_url.is_some() {
        if let Err(e) = telegram.delete_webhook().await {
            tracing::warn!(error = %e, "failed to deregister webhook");
        }
    }

    pool.close().await;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
