use super::{TokenArgs, TokenBody, no_store, token_arg};
use crate::{
    api::{
        SharedStore,
        error::{Error, ErrorBody},
    },
    user::StoreError,
};
use axum::{
    Json,
    extract::{Extension, Query, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, instrument, warn};

#[utoipa::path(
    post,
    path = "/api/v1/refresh-tokens",
    params(TokenArgs),
    responses (
        (status = 200, description = "Presented token consumed, replacement issued", body = TokenBody),
        (status = 400, description = "Missing token parameter", body = ErrorBody),
        (status = 401, description = "Token unknown or already used", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
    tag = "tokens",
)]
/// Exchange a token for a new one. The presented token is single use.
#[instrument(skip(store, query))]
pub async fn refresh_token(
    Extension(store): Extension<SharedStore>,
    query: Result<Query<TokenArgs>, QueryRejection>,
) -> Result<(StatusCode, HeaderMap, Json<TokenBody>), Error> {
    let token = token_arg(query)?;

    match store.refresh_token(&token).await {
        Ok(Some((user_id, issued))) => {
            debug!(%user_id, "token refreshed");
            Ok((
                StatusCode::OK,
                no_store(),
                Json(TokenBody {
                    token: issued.to_string(),
                }),
            ))
        }
        Ok(None) => Err(Error::InvalidToken),
        // The old token may or may not have been consumed; retrying could
        // replay it, so the client must re-authenticate.
        Err(StoreError::Timeout { operation }) => {
            warn!(operation, "refresh timed out, forcing re-authentication");
            Err(Error::InvalidToken)
        }
        Err(err) => Err(err.into()),
    }
}
