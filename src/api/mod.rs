use crate::{
    api::handlers::{health, personal_data, refresh, tokens},
    cli::telemetry,
    database::PgStore,
    user::UserStore,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::options,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, debug_span, info};
use ulid::Ulid;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

pub mod error;
mod handlers;


/// Store handle shared by all handlers.
pub type SharedStore = Arc<dyn UserStore>;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes added outside (like `OPTIONS /_healthz`) are not documented.
fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(tokens::create_token, tokens::resolve_token))
        .routes(routes!(refresh::refresh_token))
        .routes(routes!(personal_data::personal_data));

    let mut tokens_tag = Tag::new("tokens");
    tokens_tag.description = Some("Issue, resolve and refresh bearer tokens".to_string());
    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Profile lookup by internal user id".to_string());
    router.get_openapi_mut().tags = Some(vec![tokens_tag, users_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = match primary.find('<') {
        Some(start) => (
            optional_str(&primary[..start]),
            optional_str(primary[start + 1..].trim_end_matches('>')),
        ),
        None => (optional_str(primary), None),
    };
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Wire the documented routes, request-id and trace layers, and the shared
/// store and pool extensions into a servable router.
pub fn app(store: SharedStore, pool: PgPool) -> Router {
    let (router, _openapi) = api_router().split_for_parts();
    router
        .route("/_healthz", options(health::health))
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
                .layer(Extension(store))
                .layer(Extension(pool)),
        )
}

/// Serve the API on `port` until SIGINT or SIGTERM.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, pool: PgPool, operation_timeout: Duration) -> Result<()> {
    let store: SharedStore = Arc::new(PgStore::new(pool.clone(), operation_timeout));
    let app = app(store, pool.clone());

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    telemetry::shutdown_tracer();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {}", err);
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
                tracing::error!("Failed to listen for SIGTERM: {}", err);
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

    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method = %request.method(), path, request_id)
}
