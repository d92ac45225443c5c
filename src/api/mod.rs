//! HTTP surface: router, middleware stack, and server startup.

use crate::{
    cli::globals::GlobalArgs,
    gate::{
        flow::VerificationFlow, guard::MemoryGuardStore, session::MemorySessionStore,
        store::MemoryTokenStore,
    },
    shortener::VplinkClient,
};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Build the application router around an already-wired flow controller.
#[must_use]
pub fn router(flow: Arc<VerificationFlow>) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/verify/start", get(handlers::start))
        .route("/verify/check-access", post(handlers::check_access))
        .route("/verify/token", post(handlers::redeem))
        .route("/verify/session", get(handlers::session))
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
                .layer(Extension(flow)),
        )
}

/// Start the server.
///
/// # Errors
/// Returns an error if the shortener client cannot be built or the listener
/// fails to bind.
pub async fn new(port: u16, public_url: &str, globals: &GlobalArgs) -> Result<()> {
    let shortener = Arc::new(VplinkClient::new(
        &globals.shortener_endpoint,
        globals.shortener_api_key.clone(),
    )?);

    let flow = Arc::new(VerificationFlow::new(
        Arc::new(MemoryTokenStore::new()),
        Arc::new(MemoryGuardStore::new()),
        Arc::new(MemorySessionStore::new()),
        shortener,
        public_url.to_string(),
    ));

    let app = router(flow);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
