use {
    anyhow::Context,
    pay_sync::{
        AppState,
        adapters::{entitlement::HttpEntitlementNotifier, gateway::GatewayClient},
        config::Config,
        domain::store::PaymentStore,
        infra::{memory::InMemoryPaymentStore, postgres::PgPaymentStore},
        services::reconcile::Reconciler,
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let store: Arc<dyn PaymentStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(url)
                .await
                .context("failed to connect to database")?;
            let store = PgPaymentStore::new(pool);
            store.migrate().await.context("failed to run migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, payments are kept in memory only");
            Arc::new(InMemoryPaymentStore::new())
        }
    };

    let gateway = GatewayClient::new(config.gateway_base_url, config.gateway_credentials)
        .context("failed to build gateway client")?;
    if !gateway.has_credentials() {
        tracing::warn!("gateway credentials not set, webhook cleanup will be skipped");
    }

    let notifier =
        HttpEntitlementNotifier::new(config.entitlement_url, config.entitlement_timeout)
            .context("failed to build entitlement client")?;

    let reconciler = Reconciler::new(store, Arc::new(notifier), Arc::new(gateway))
        .with_notifier_timeout(config.entitlement_timeout);

    let state = AppState {
        reconciler: Arc::new(reconciler),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, pay_sync::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
