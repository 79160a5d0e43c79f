use super::{PgStore, db_error};
use crate::user::{
    ExternalIdentity, IdentityRegistry, PersonalData, PersonalDataFetcher, StoreError,
    StoreFuture, StoreResult, UserId,
};
use sqlx::Row;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

const SELECT_USER_ID_BY_IDENTITY: &str =
    "SELECT user_id FROM user_ids WHERE login = $1 AND auth_user_type = $2";

// The no-op DO UPDATE locks the conflicting row and returns its id, so a
// caller that loses the insert race still gets the persisted user_id.
const UPSERT_USER_ID: &str = r"
    INSERT INTO user_ids (user_id, login, auth_method, auth_user_type)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (login, auth_user_type) DO UPDATE SET login = user_ids.login
    RETURNING user_id
";

const SELECT_PERSONAL_DATA: &str =
    "SELECT user_id, login, auth_user_type FROM user_ids WHERE user_id = $1";

impl PgStore {
    async fn lookup_user_id(&self, identity: &ExternalIdentity) -> StoreResult<Option<UserId>> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = SELECT_USER_ID_BY_IDENTITY
        );
        let row = sqlx::query(SELECT_USER_ID_BY_IDENTITY)
            .bind(identity.login())
            .bind(identity.auth_user_type())
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .map_err(db_error("lookup_user_id"))?;

        row.map(|row| row.try_get::<Uuid, _>("user_id"))
            .transpose()
            .map(|id| id.map(UserId::from_uuid))
            .map_err(db_error("lookup_user_id"))
    }

    async fn upsert_user_id(&self, identity: &ExternalIdentity) -> StoreResult<UserId> {
        let candidate =
            UserId::generate().map_err(|e| StoreError::identifier("get_or_create_user_id", e))?;

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = UPSERT_USER_ID
        );
        let row = sqlx::query(UPSERT_USER_ID)
            .bind(candidate.as_uuid())
            .bind(identity.login())
            .bind(identity.auth_method())
            .bind(identity.auth_user_type())
            .fetch_one(self.pool())
            .instrument(span)
            .await
            .map_err(db_error("get_or_create_user_id"))?;

        let persisted = UserId::from_uuid(
            row.try_get::<Uuid, _>("user_id")
                .map_err(db_error("get_or_create_user_id"))?,
        );
        if persisted != candidate {
            debug!("concurrent registration won the race, using persisted user id");
        }
        Ok(persisted)
    }

    async fn get_or_create(&self, identity: &ExternalIdentity) -> StoreResult<UserId> {
        if let Some(user_id) = self.lookup_user_id(identity).await? {
            return Ok(user_id);
        }
        self.upsert_user_id(identity).await
    }

    async fn personal_data(&self, user_id: &str) -> StoreResult<PersonalData> {
        let user_id = UserId::parse(user_id).ok_or(StoreError::NotFound)?;

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = SELECT_PERSONAL_DATA
        );
        let row = sqlx::query(SELECT_PERSONAL_DATA)
            .bind(user_id.as_uuid())
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .map_err(db_error("fetch_personal_data"))?
            .ok_or(StoreError::NotFound)?;

        let login: String = row
            .try_get("login")
            .map_err(db_error("fetch_personal_data"))?;
        let auth_user_type: String = row
            .try_get("auth_user_type")
            .map_err(db_error("fetch_personal_data"))?;

        Ok(PersonalData::from_record(user_id, &login, &auth_user_type))
    }
}

impl IdentityRegistry for PgStore {
    fn get_or_create_user_id<'a>(
        &'a self,
        identity: &'a ExternalIdentity,
    ) -> StoreFuture<'a, UserId> {
        Box::pin(self.bounded("get_or_create_user_id", self.get_or_create(identity)))
    }
}

impl PersonalDataFetcher for PgStore {
    fn fetch_personal_data<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, PersonalData> {
        Box::pin(self.bounded("fetch_personal_data", self.personal_data(user_id)))
    }
}
