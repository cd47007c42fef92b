//! # Solfa API Server
//!
//! Serves the Solfa REST API on top of PostgreSQL (accounts and partition
//! records), an S3-compatible object store (partition files),
//! Elasticsearch (search and the user action trail) and an optional SMTP
//! relay (verification mail).
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p solfa-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use anyhow::Context;
use solfa_api::{
    app::{build_router, AppState, Backends},
    config::Config,
};
use solfa_shared::{
    db::{self, DatabaseConfig},
    models::{partition::PgPartitionStore, user::PgUserStore},
    notify::{LogNotifier, Notifier, SmtpConfig, SmtpNotifier},
    search::elastic::{ElasticsearchConfig, ElasticsearchIndex},
    storage::s3::{S3Config, S3ObjectStore},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Solfa API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = db::create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to the database")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let backends = build_backends(&config, &pool).await?;
    let address = config.bind_address();
    let app = build_router(AppState::new(config, backends));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, closing database pool");
    db::close_pool(pool).await;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "solfa_api=debug,solfa_shared=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Connects the production backends
async fn build_backends(config: &Config, pool: &PgPool) -> anyhow::Result<Backends> {
    let objects = S3ObjectStore::new(S3Config {
        endpoint: config.storage.endpoint.clone(),
        access_key: config.storage.access_key.clone(),
        secret_key: config.storage.secret_key.clone(),
        bucket: config.storage.bucket.clone(),
        region: config.storage.region.clone(),
        secure: config.storage.secure,
    })
    .context("Invalid object storage configuration")?;
    objects
        .ensure_bucket()
        .await
        .with_context(|| format!("Failed to prepare bucket {}", objects.bucket()))?;

    let index = ElasticsearchIndex::new(ElasticsearchConfig {
        host: config.search.host.clone(),
        username: config.search.username.clone(),
        password: config.search.password.clone(),
        accept_invalid_certs: config.search.accept_invalid_certs,
    })
    .context("Invalid search configuration")?;

    let notifier: Arc<dyn Notifier> = match &config.mail.smtp_host {
        Some(host) => Arc::new(
            SmtpNotifier::new(SmtpConfig {
                host: host.clone(),
                port: config.mail.smtp_port,
                username: config.mail.smtp_user.clone(),
                password: config.mail.smtp_password.clone(),
                from: config.mail.from.clone(),
            })
            .context("Invalid SMTP configuration")?,
        ),
        None => {
            tracing::warn!("SMTP_HOST not set, verification links will only be logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(Backends {
        users: Arc::new(PgUserStore::new(pool.clone())),
        partitions: Arc::new(PgPartitionStore::new(pool.clone())),
        objects: Arc::new(objects),
        index: Arc::new(index),
        notifier,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
