use std::sync::Arc;

use authd::config::AuthdConfig;
use authd::identity::CredentialStore;
use authd::identity::memory::InMemoryStore;
use authd::identity::postgres::PostgresStore;
use authd::logger::ActivityLogger;
use authd::metrics::AuthMetrics;
use authd::tracker::ConnectionTracker;
use authd::{AppState, webhook};
use eyre::WrapErr;
use metrics_endpoint::{HealthController, MetricsEndpointConfig, run_metrics_endpoint};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config = AuthdConfig::load().wrap_err("loading configuration")?;

    let env_filter = tracing_subscriber::EnvFilter::try_new(&config.log.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(logfmt::layer())
        .try_init()
        .wrap_err("initializing tracing subscriber")?;

    let registry = prometheus::Registry::new();
    let metrics = Arc::new(AuthMetrics::register(&registry));
    let health_controller = HealthController::default();

    let store: Arc<dyn CredentialStore> = match &config.store.database_url {
        Some(database_url) => Arc::new(
            PostgresStore::connect(database_url, config.password.hash_cost)
                .await
                .wrap_err("connecting to credential store")?,
        ),
        None => {
            tracing::warn!("store.database_url unset, using in-memory credential store");
            Arc::new(InMemoryStore::new(config.password.hash_cost))
        }
    };

    let logger = ActivityLogger::spawn(config.logger.queue_capacity, config.logger.batch_size);
    let tracker = Arc::new(ConnectionTracker::new());
    let cache = Arc::new(authd::cache::VerdictCache::new(
        config.cache.capacity,
        config.cache.connect_ttl_ms,
        config.cache.deny_ttl_ms,
    ));

    let decision_bind = config.server.decision_bind;
    let metrics_bind = config.server.metrics_bind;

    let state = Arc::new(AppState {
        store,
        cache,
        tracker,
        logger,
        metrics,
        config,
    });

    health_controller.set_healthy(true);
    health_controller.set_ready(true);

    let app = webhook::router(state);
    let decision_listener = tokio::net::TcpListener::bind(decision_bind)
        .await
        .wrap_err("binding decision listener")?;
    tracing::info!(%decision_bind, "decision listener ready");

    let metrics_config = MetricsEndpointConfig {
        address: metrics_bind,
        registry,
        health_controller: Some(health_controller),
    };

    tokio::try_join!(
        async {
            axum::serve(decision_listener, app)
                .await
                .wrap_err("decision listener failed")
        },
        async {
            run_metrics_endpoint(&metrics_config)
                .await
                .wrap_err("metrics listener failed")
        },
    )?;

    Ok(())
}
