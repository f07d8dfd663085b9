//! # cushionctl: inventory and workflow service for cushion manufacturing
//!
//! `cushionctl` tracks fabrics, accessories, finished products, design ideas and client
//! requirements behind a login-gated HTTP API. Catalog reads are public; every mutation passes a
//! role check and leaves an entry in the operation log.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Persistence goes through the
//! storage ports in [`store`], backed either by PostgreSQL (the repositories in [`db`]) or by
//! in-process concurrent maps for ephemeral runs and tests.
//!
//! A request flows through three steps, strictly in order:
//!
//! 1. **Gate** ([`auth`]): the session cookie is resolved to a user and role. Handlers receive the
//!    caller as an explicit [`CurrentUser`](api::models::users::CurrentUser) or
//!    [`Authorized`](auth::gate::Authorized) argument, and every protected route names the exact
//!    set of roles it admits.
//! 2. **Handler** ([`api`]): the business operation.
//! 3. **Audit** ([`audit`]): after the operation succeeds, one entry is appended to the operation
//!    log. Failure to write it is logged and otherwise ignored.
//!
//! Sessions are server-side. The cookie carries an opaque random token and only its SHA-256 digest
//! is stored. Expiry is checked on every resolution; a background sweep reclaims expired rows.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use cushionctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = cushionctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     cushionctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{delete, get, patch, post},
};
use bon::Builder;
use chrono::Utc;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, error, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers::{auth as auth_handlers, catalog, operation_logs, statistics, users},
    api::models::users::Role,
    audit::AuditLogger,
    auth::{
        gate::{AccessPolicy, AnyUser, Editors},
        password,
    },
    config::{DatabaseConfig, PoolSettings, SessionConfig},
    db::models::{
        catalog::{Accessory, ClientRequirement, DesignIdea, Entity, Fabric, Product},
        users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    openapi::ApiDoc,
    store::{CatalogStores, CredentialStore, SelectStore, SessionStore, Stores},
};

pub use config::Config;
pub use types::{EntityId, OperationLogId, SessionId, UserId};

/// Application state shared across all request handlers.
///
/// Every storage dependency is a trait object, so the same handlers run against PostgreSQL in
/// production and against the in-memory backend in tests.
///
/// # Example
///
/// ```ignore
/// let stores = Stores::in_memory();
/// let state = AppState::builder()
///     .config(config)
///     .users(stores.users)
///     .sessions(stores.sessions)
///     .audit(AuditLogger::new(stores.audit))
///     .catalog(stores.catalog)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: AuditLogger,
    pub catalog: CatalogStores,
}

impl AppState {
    pub fn from_stores(config: Config, stores: Stores) -> Self {
        Self::builder()
            .config(config)
            .users(stores.users)
            .sessions(stores.sessions)
            .audit(AuditLogger::new(stores.audit))
            .catalog(stores.catalog)
            .build()
    }
}

/// Get the cushionctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Ensure an admin account exists for `email`.
///
/// An existing account is promoted to admin and, if `password` is given, has it (re)applied. A new
/// account without a password gets a random one nobody knows, so it cannot log in until changed.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    email: &str,
    password: Option<&str>,
    users: &dyn CredentialStore,
    params: password::Argon2Params,
) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(pwd) => Some(password::hash_password_blocking(pwd.to_string(), params).await?),
        None => None,
    };

    if let Some(existing) = users.get_user_by_email(email).await? {
        let update = UserUpdateDBRequest {
            role: (existing.role != Role::Admin).then_some(Role::Admin),
            password_hash,
            ..Default::default()
        };
        if update.role.is_some() || update.password_hash.is_some() {
            users.update_user(existing.id, &update).await?;
        }
        info!("Admin user {} already exists", email);
        return Ok(existing.id);
    }

    let password_hash = match password_hash {
        Some(hash) => hash,
        None => password::hash_password_blocking(password::generate_token(), params).await?,
    };
    let created = users
        .create_user(&UserCreateDBRequest {
            email: email.to_string(),
            name: "Administrator".to_string(),
            password_hash,
            role: Role::Admin,
        })
        .await?;
    info!("Created admin user {}", email);
    Ok(created.id)
}

async fn connect_pool(url: &str, settings: &PoolSettings) -> anyhow::Result<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }
    Ok(options.connect(url).await?)
}

/// Connect the configured backend. For PostgreSQL this also runs pending migrations.
async fn setup_storage(config: &Config) -> anyhow::Result<(Option<PgPool>, Stores)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            info!("Connecting to external database");
            let pool = connect_pool(url, pool).await?;
            migrator().run(&pool).await?;
            Ok((Some(pool.clone()), Stores::postgres(pool)))
        }
        DatabaseConfig::Memory => {
            warn!("Using in-memory storage; all data is lost on restart");
            Ok((None, Stores::in_memory()))
        }
    }
}

/// Routes for one catalog collection. `P` decides who may create records.
fn catalog_routes<E, P>(path: &str) -> Router<AppState>
where
    E: Entity,
    P: AccessPolicy,
    CatalogStores: SelectStore<E>,
{
    Router::new()
        .route(path, get(catalog::list::<E>).post(catalog::create::<E, P>))
        .route(
            &format!("{path}/{{id}}"),
            get(catalog::get::<E>).put(catalog::update::<E>).delete(catalog::delete::<E>),
        )
}

/// Build the application router with every route and middleware layer
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Authentication
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/logout", post(auth_handlers::logout))
        .route("/user", get(auth_handlers::get_current_user))
        .route("/password-change", post(auth_handlers::change_password))
        // User administration
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", patch(users::update_user).delete(users::delete_user))
        .route("/users/{id}/sessions", delete(users::revoke_user_sessions))
        // Audit trail
        .route("/operation-logs", get(operation_logs::list_operation_logs))
        // Dashboard
        .route("/statistics", get(statistics::get_statistics))
        // Catalog
        .merge(catalog_routes::<Fabric, Editors>("/fabrics"))
        .merge(catalog_routes::<Accessory, Editors>("/accessories"))
        .merge(catalog_routes::<Product, Editors>("/products"))
        .merge(catalog_routes::<DesignIdea, AnyUser>("/design-ideas"))
        .merge(catalog_routes::<ClientRequirement, AnyUser>("/client-requirements"));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()))
        .with_state(state);

    // Security headers on every response
    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    router.layer(security_headers).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Periodically delete expired sessions until `shutdown` is cancelled
async fn run_session_sweep(sessions: Arc<dyn SessionStore>, config: SessionConfig, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(config.sweep_interval);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Session sweep stopping");
                return;
            }
            _ = interval.tick() => {
                match sessions.delete_expired_sessions(Utc::now()).await {
                    Ok(0) => debug!("Session sweep found nothing to remove"),
                    Ok(removed) => info!("Session sweep removed {} expired session(s)", removed),
                    Err(e) => error!("Session sweep failed: {}", e),
                }
            }
        }
    }
}

/// Tasks running alongside the HTTP server.
///
/// Dropping this cancels the shutdown token through `drop_guard`, which stops every task.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    fn start(state: &AppState) -> Self {
        let shutdown_token = CancellationToken::new();
        let sweep = tokio::spawn(run_session_sweep(
            state.sessions.clone(),
            state.config.auth.session.clone(),
            shutdown_token.clone(),
        ));

        Self {
            background_tasks: vec![sweep],
            drop_guard: Some(shutdown_token.clone().drop_guard()),
            shutdown_token,
        }
    }

    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            if let Err(e) = handle.await {
                error!("Background task failed during shutdown: {}", e);
            }
        }
    }
}

/// The assembled service: storage, router and background tasks.
///
/// 1. **Create**: [`Application::new`] connects storage, runs migrations, ensures the bootstrap
///    admin and starts the session sweep
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles requests
/// 3. **Shutdown**: when the shutdown future resolves, background tasks stop and the pool closes
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting cushionctl with configuration: {:#?}", config);
        let (pool, stores) = setup_storage(&config).await?;
        Self::with_stores(config, stores, pool).await
    }

    /// Create an application over already-connected stores
    pub async fn with_stores(config: Config, stores: Stores, pool: Option<PgPool>) -> anyhow::Result<Self> {
        if let Some(email) = &config.admin_email {
            create_initial_admin_user(
                email,
                config.admin_password.as_deref(),
                stores.users.as_ref(),
                config.auth.password.argon2_params(),
            )
            .await?;
        }

        let state = AppState::from_stores(config.clone(), stores);
        let bg_services = BackgroundServices::start(&state);
        let router = build_router(state);

        Ok(Self {
            router,
            config,
            pool,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "cushionctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
