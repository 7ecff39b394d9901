use crate::api::handlers::{admin, health, resume};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
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
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod email;
pub mod error;
pub mod handlers;
pub mod objects;
mod openapi;

pub use openapi::openapi;

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Outbound mail configuration; both fields are needed to actually send.
#[derive(Clone, Debug, Default)]
pub struct MailSettings {
    pub api_url: Option<String>,
    pub from: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StorageSettings {
    pub base_url: String,
    pub bucket: String,
}

/// Build the API router. Handlers read their state from extensions, which
/// `new` layers on once the stores are wired.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/resume/send-link", post(resume::send_link))
        .route("/v1/resume/exchange", get(resume::exchange))
        .route(
            "/v1/resume/draft",
            get(resume::get_draft).post(resume::save_draft),
        )
        .route("/v1/resume/uploads", post(resume::presign_upload))
        .route("/v1/resume/whoami", get(resume::whoami))
        .route("/v1/resume/logout", post(resume::logout))
        .route("/v1/admin/auth/request", post(admin::request_magic_link))
        .route("/v1/admin/auth/verify", get(admin::verify_magic_link))
        .route("/v1/admin/submissions/:token", get(admin::get_submission))
}

/// Start the server.
///
/// # Errors
/// Returns an error if configuration validation, the database connection or
/// the listener fails.
pub async fn new(
    port: u16,
    dsn: String,
    resume_config: resume::ResumeConfig,
    admin_config: admin::AdminAuthConfig,
    magic_secret: SecretString,
    session_secret: SecretString,
    mail: MailSettings,
    storage: StorageSettings,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let mailer = match (&mail.api_url, &mail.from) {
        (Some(api_url), Some(from)) => email::MailDispatcher::new(Arc::new(
            email::HttpEmailSender::new(api_url.clone(), from.clone())?,
        )),
        _ => {
            // Without a sending identity links are logged for manual pickup.
            info!("mail delivery not configured; links will be logged");
            email::MailDispatcher::disabled()
        }
    };

    let store: Arc<dyn resume::store::ResumeStore> =
        Arc::new(resume::store::PgResumeStore::new(pool.clone()));
    let objects: Arc<dyn objects::ObjectStore> = Arc::new(objects::HttpObjectStore::new(
        storage.base_url,
        storage.bucket,
    )?);

    spawn_purge_task(store.clone(), resume_config.draft_ttl_days());

    let resume_state = Arc::new(resume::ResumeState::new(
        resume_config,
        store,
        objects,
        mailer.clone(),
    ));
    let admin_state = Arc::new(admin::AdminAuthState::new(
        admin_config,
        &magic_secret,
        &session_secret,
        mailer,
        admin::AuditRecorder::new(Arc::new(admin::audit::PgAuditSink::new(pool.clone()))),
        Arc::new(admin::rate_limit::SystemClock),
    )?);

    let cors = cors_layer(&[
        resume_state.config().public_base_url(),
        Some(admin_state.config().ui_base_url()),
    ])?;

    let app = router()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
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
                .layer(Extension(resume_state))
                .layer(Extension(admin_state))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Periodically drop expired resume tokens and idle drafts.
fn spawn_purge_task(
    store: Arc<dyn resume::store::ResumeStore>,
    draft_ttl_days: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(PURGE_INTERVAL).await;
            match store.purge_expired(draft_ttl_days).await {
                Ok(0) => {}
                Ok(removed) => info!("purged {removed} expired rows"),
                Err(err) => error!("store purge failed: {err}"),
            }
        }
    })
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

fn cors_layer(base_urls: &[Option<&str>]) -> Result<CorsLayer> {
    let mut origins = Vec::new();
    for base_url in base_urls.iter().flatten() {
        origins.push(origin_header(base_url)?);
    }
    origins.dedup();

    Ok(CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

fn origin_header(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Base URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build origin header")
}
