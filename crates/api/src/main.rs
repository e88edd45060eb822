//! Warden API server

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_shared::{Clock, MemoryStore, PgStore, PrincipalStore, SystemClock, TokenStore};

use warden_api::{
    bootstrap::seed_admin,
    email::{EmailConfig, SecurityEmailService},
    routes::create_router,
    sweeper::spawn_session_sweeper,
    AppState, Collaborators, Config,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warden_api=info,warden_shared=info,tower_http=info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn stores(config: &Config) -> anyhow::Result<(Arc<dyn PrincipalStore>, Arc<dyn TokenStore>)> {
    match &config.database_url {
        Some(url) => {
            let pool = warden_shared::create_pool(url, config.database_max_connections)
                .await
                .context("Failed to connect to database")?;
            warden_shared::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Using Postgres stores");
            let store = Arc::new(PgStore::new(pool));
            let principals: Arc<dyn PrincipalStore> = store.clone();
            let tokens: Arc<dyn TokenStore> = store;
            Ok((principals, tokens))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores (data is lost on restart)");
            let store = Arc::new(MemoryStore::new());
            let principals: Arc<dyn PrincipalStore> = store.clone();
            let tokens: Arc<dyn TokenStore> = store;
            Ok((principals, tokens))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    let (principals, tokens) = stores(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(principals.as_ref(), admin, clock.now())
            .await
            .context("Failed to seed bootstrap administrator")?;
    }

    let mailer = SecurityEmailService::new(EmailConfig::from_config(&config));
    if !mailer.is_enabled() {
        tracing::warn!("RESEND_API_KEY not set, reset emails will be skipped");
    }

    let bind_address = config.bind_address.clone();
    let sweep_every = config.session_sweep_interval;
    let retention = config.session_retention;

    let state = AppState::build(
        config,
        Collaborators {
            principals,
            tokens,
            mailer: Arc::new(mailer),
            clock,
        },
    )
    .context("Failed to initialise password hashing")?;

    let sweeper = spawn_session_sweeper(Arc::clone(&state.registry), sweep_every, retention);
    let app = create_router(state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Listening on {}", bind_address);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Gracefully shutdown");
    Ok(())
}
