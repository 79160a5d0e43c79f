use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tokio::time::{Duration, timeout};
use tracing::{Instrument, debug, error, info_span, instrument, warn};
use utoipa::ToSchema;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/_healthz",
    responses (
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
/// Report build metadata and database reachability. `OPTIONS` returns the
/// same status and `X-App` header without a body.
#[instrument(skip(pool))]
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let db_healthy = probe_database(&pool.0).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy { "ok" } else { "error" }.to_string(),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let headers = x_app_header(&health);

    if db_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

fn x_app_header(health: &Health) -> HeaderMap {
    let short_hash = health.commit.get(..7).unwrap_or("");

    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => debug!("Failed to parse X-App header: {}", err),
    }
    headers
}

async fn probe_database(pool: &PgPool) -> bool {
    let acquire_span = info_span!(
        "db.acquire",
        db.system = "postgresql",
        db.operation = "ACQUIRE"
    );

    let probe = async {
        match pool.acquire().instrument(acquire_span).await {
            Ok(mut conn) => {
                let ping_span =
                    info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                match conn.ping().instrument(ping_span).await {
                    Ok(()) => true,
                    Err(err) => {
                        error!("Failed to ping database: {}", err);
                        false
                    }
                }
            }
            Err(err) => {
                error!("Failed to acquire database connection: {}", err);
                false
            }
        }
    };

    if let Ok(healthy) = timeout(Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS), probe).await {
        healthy
    } else {
        warn!("Database health check timed out");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_app_header_uses_short_commit() {
        let health = Health {
            commit: "0123456789abcdef".to_string(),
            name: "auth-api".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        };
        let headers = x_app_header(&health);
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("auth-api:0.1.0:0123456")
        );
    }

    #[test]
    fn x_app_header_omits_short_commit_when_unknown() {
        let health = Health {
            commit: "n/a".to_string(),
            name: "auth-api".to_string(),
            version: "0.1.0".to_string(),
            database: "error".to_string(),
        };
        let headers = x_app_header(&health);
        assert_eq!(
            headers.get("X-App").and_then(|v| v.to_str().ok()),
            Some("auth-api:0.1.0:")
        );
    }
}
