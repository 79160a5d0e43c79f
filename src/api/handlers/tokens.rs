use super::{TokenArgs, TokenBody, no_store, token_arg};
use crate::{
    api::{
        SharedStore,
        error::{Error, ErrorBody},
    },
    user::ExternalIdentity,
};
use axum::{
    Json,
    extract::{
        Extension, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct CreateTokenRequest {
    login: String,
    auth_user_type: String,
    #[serde(default)]
    auth_method: String,
    /// Accepted for compatibility; not verified.
    #[serde(default)]
    #[allow(dead_code)]
    auth_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UserIdBody {
    pub user_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/tokens",
    request_body = CreateTokenRequest,
    responses (
        (status = 200, description = "Token issued", body = TokenBody),
        (status = 400, description = "Malformed body or empty identity fields", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
    tag = "tokens",
)]
/// Register (or look up) the caller's identity and issue a token for it.
#[instrument(skip(store, payload))]
pub async fn create_token(
    Extension(store): Extension<SharedStore>,
    payload: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<TokenBody>), Error> {
    let Json(request) = payload.map_err(|rejection| Error::Validation(rejection.body_text()))?;
    let identity = ExternalIdentity::new(
        request.login,
        request.auth_user_type,
        request.auth_method,
    )?;

    let user_id = store.get_or_create_user_id(&identity).await?;
    let token = store.create_token(user_id).await?;

    debug!(%user_id, "token issued");

    Ok((
        StatusCode::OK,
        no_store(),
        Json(TokenBody {
            token: token.to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/tokens",
    params(TokenArgs),
    responses (
        (status = 200, description = "Owner of the token, null when unknown or consumed", body = UserIdBody),
        (status = 400, description = "Missing token parameter", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
    tag = "tokens",
)]
/// Resolve a token to its owner without consuming it.
#[instrument(skip(store, query))]
pub async fn resolve_token(
    Extension(store): Extension<SharedStore>,
    query: Result<Query<TokenArgs>, QueryRejection>,
) -> Result<Json<UserIdBody>, Error> {
    let token = token_arg(query)?;
    let user_id = store.get_user_id(&token).await?;

    Ok(Json(UserIdBody {
        user_id: user_id.map(|id| id.to_string()),
    }))
}
