pub mod health;
pub mod personal_data;
pub mod refresh;
pub mod tokens;

use crate::api::error::Error;
use axum::{
    extract::{Query, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, header::CACHE_CONTROL},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TokenBody {
    pub token: String,
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct TokenArgs {
    /// Token previously issued by this service
    token: String,
}

/// Extract the `token` query parameter, rejecting a missing or blank value.
fn token_arg(query: Result<Query<TokenArgs>, QueryRejection>) -> Result<String, Error> {
    let Ok(Query(args)) = query else {
        return Err(Error::Validation("missing token parameter".to_string()));
    };
    let token = args.token.trim();
    if token.is_empty() {
        return Err(Error::Validation("missing token parameter".to_string()));
    }
    Ok(token.to_string())
}

fn no_store() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}
