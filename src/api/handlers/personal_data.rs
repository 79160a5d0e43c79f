use crate::{
    api::{
        SharedStore,
        error::{Error, ErrorBody},
    },
    user::PersonalData,
};
use axum::{
    Json,
    extract::{Extension, Query, rejection::QueryRejection},
};
use serde::Deserialize;
use tracing::instrument;
use utoipa::IntoParams;

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct PersonalDataArgs {
    #[serde(rename = "userId")]
    user_id: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/personal-data",
    params(PersonalDataArgs),
    responses (
        (status = 200, description = "Profile of the user", body = PersonalData),
        (status = 400, description = "Missing userId parameter", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody),
        (status = 500, description = "Store failure", body = ErrorBody)
    ),
    tag = "users",
)]
#[instrument(skip(store, query))]
pub async fn personal_data(
    Extension(store): Extension<SharedStore>,
    query: Result<Query<PersonalDataArgs>, QueryRejection>,
) -> Result<Json<PersonalData>, Error> {
    let user_id = match query {
        Ok(Query(args)) if !args.user_id.trim().is_empty() => args.user_id,
        _ => return Err(Error::Validation("missing userId parameter".to_string())),
    };

    Ok(Json(store.fetch_personal_data(&user_id).await?))
}
