/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use solfa_api::{app::{AppState, Backends}, config::Config};
/// use solfa_shared::{
///     models::memory::{MemoryPartitionStore, MemoryUserStore},
///     notify::LogNotifier,
///     search::memory::MemorySearchIndex,
///     storage::memory::MemoryObjectStore,
/// };
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let backends = Backends {
///     users: Arc::new(MemoryUserStore::new()),
///     partitions: Arc::new(MemoryPartitionStore::new()),
///     objects: Arc::new(MemoryObjectStore::new()),
///     index: Arc::new(MemorySearchIndex::new()),
///     notifier: Arc::new(LogNotifier),
/// };
/// let app = solfa_api::app::build_router(AppState::new(config, backends));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use solfa_shared::{
    audit::AuditLog,
    auth::middleware::authenticate,
    models::{partition::PartitionStore, user::UserStore},
    notify::Notifier,
    partitions::PartitionWorkflow,
    search::SearchIndex,
    storage::ObjectStore,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Storage and delivery backends the API runs on
///
/// `main` wires the Postgres, S3, Elasticsearch and SMTP implementations;
/// tests wire the in-memory ones.
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub partitions: Arc<dyn PartitionStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub index: Arc<dyn SearchIndex>,
    pub notifier: Arc<dyn Notifier>,
}

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// User accounts
    pub users: Arc<dyn UserStore>,

    /// Upload / validate / search coordinator
    pub partitions: Arc<PartitionWorkflow>,

    /// Verification mail delivery
    pub notifier: Arc<dyn Notifier>,

    /// User action trail
    pub audit: AuditLog,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(config: Config, backends: Backends) -> Self {
        let audit = AuditLog::new(backends.index.clone(), config.search.audit_index.clone());
        let workflow = PartitionWorkflow::new(
            backends.partitions,
            backends.objects,
            backends.index,
            audit.clone(),
            config.search.partition_index.clone(),
        );

        Self {
            users: backends.users,
            partitions: Arc::new(workflow),
            notifier: backends.notifier,
            audit,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /solfa               # Liveness (public)
/// ├── GET  /health              # Health check (public)
/// ├── POST /signup              # Create account (public)
/// ├── GET  /verify?token=       # Confirm email (public)
/// ├── POST /login               # Issue session token (public)
/// ├── POST /logout              # Reads its own bearer token
/// ├── GET  /search?q=           # Partition search (public)
/// ├── GET  /me                  # Own profile (authenticated)
/// ├── PUT  /me                  # Update own profile (authenticated)
/// ├── GET  /users/:id           # Profile by id (authenticated)
/// ├── POST /upload              # Multipart partition upload (authenticated)
/// └── POST /validate            # Promote staging -> validated (authenticated)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
/// 4. Authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/solfa", get(routes::health::solfa))
        .route("/health", get(routes::health::health_check))
        .route("/signup", post(routes::auth::signup))
        .route("/verify", get(routes::auth::verify))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/search", get(routes::partitions::search));

    let protected_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_me).put(routes::users::update_me),
        )
        .route("/users/:id", get(routes::users::get_user))
        .route("/validate", post(routes::partitions::validate))
        .route(
            "/upload",
            post(routes::partitions::upload)
                .layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes)),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the token from the Authorization header, then injects
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth = authenticate(header, state.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request authentication");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
