use crate::{
    api::handlers::{health, root},
    cli::globals::GlobalArgs,
    otp::{
        code::CodeHasher,
        delivery::CodeSender,
        identity::{IdentityStore, MemoryIdentityStore, PgIdentityStore},
        session::JwtSessionIssuer,
        store::{ChallengeStore, MemoryChallengeStore, PgChallengeStore},
        OtpConfig, OtpService, SCHEMA_SQL,
    },
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Instrument, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Server settings that are not part of the OTP protocol itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub frontend_base_url: String,
    pub session_issuer: String,
    pub session_ttl_seconds: i64,
    pub purge_interval: Duration,
}

/// Assemble the full application: documented routes, `/`, `OPTIONS /health`,
/// request ids, tracing, CORS, and the shared state.
#[must_use]
pub fn app(
    service: Arc<OtpService>,
    sessions: Arc<JwtSessionIssuer>,
    frontend_origin: HeaderValue,
) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT_LANGUAGE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (router, _openapi) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(service))
                .layer(Extension(sessions)),
        )
}

/// Start the server
/// # Errors
/// Return error if the database or the listener cannot be set up
pub async fn new(
    port: u16,
    dsn: Option<String>,
    globals: &GlobalArgs,
    otp_config: OtpConfig,
    server_config: ServerConfig,
    sender: Arc<dyn CodeSender>,
) -> Result<()> {
    let (store, identities) = stores(dsn.as_deref()).await?;

    let sessions = Arc::new(JwtSessionIssuer::new(
        &globals.session_secret,
        server_config.session_issuer.clone(),
        server_config.session_ttl_seconds,
    ));

    let service = Arc::new(OtpService::new(
        otp_config,
        CodeHasher::new(globals.otp_code_pepper.clone()),
        store,
        sender,
        identities,
        sessions.clone(),
    ));

    // Dead challenges are swept once both their expiry and resend window passed.
    let purge_worker = service.spawn_purge_worker(server_config.purge_interval);

    let frontend_origin = frontend_origin(&server_config.frontend_base_url)?;
    let app = app(service, sessions, frontend_origin);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Gracefully shutdown");
        })
        .await?;

    purge_worker.abort();

    Ok(())
}

async fn stores(dsn: Option<&str>) -> Result<(Arc<dyn ChallengeStore>, Arc<dyn IdentityStore>)> {
    let Some(dsn) = dsn else {
        warn!("No DSN configured, challenges and identities are kept in memory");
        let store: Arc<dyn ChallengeStore> = Arc::new(MemoryChallengeStore::new());
        let identities: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
        return Ok((store, identities));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "MIGRATE"
    );
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&pool)
        .instrument(span)
        .await
        .context("Failed to apply database schema")?;

    let store: Arc<dyn ChallengeStore> = Arc::new(PgChallengeStore::new(pool.clone()));
    let identities: Arc<dyn IdentityStore> = Arc::new(PgIdentityStore::new(pool));
    Ok((store, identities))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Origin (`scheme://host[:port]`) of the frontend allowed by CORS.
///
/// # Errors
/// Returns an error if the URL does not parse or has no host.
pub fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
