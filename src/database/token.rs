use super::{PgStore, db_error};
use crate::user::{StoreError, StoreFuture, StoreResult, Token, TokenLedger, UserId};
use sqlx::{PgConnection, Row};
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

const MAX_INSERT_ATTEMPTS: usize = 3;

const INSERT_TOKEN: &str = r"
    INSERT INTO tokens (token, user_id, created_at)
    VALUES ($1, $2, NOW())
    ON CONFLICT (token) DO NOTHING
    RETURNING token
";

const SELECT_TOKEN_OWNER: &str = "SELECT user_id FROM tokens WHERE token = $1";

const DELETE_TOKEN: &str = "DELETE FROM tokens WHERE token = $1 RETURNING user_id";

/// Insert a fresh token for `user_id`. A primary-key collision draws a new
/// value instead of failing the caller.
async fn insert_token(
    conn: &mut PgConnection,
    operation: &'static str,
    user_id: UserId,
) -> StoreResult<Token> {
    for attempt in 1..=MAX_INSERT_ATTEMPTS {
        let token = Token::generate().map_err(|e| StoreError::identifier(operation, e))?;

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = INSERT_TOKEN
        );
        let inserted = sqlx::query(INSERT_TOKEN)
            .bind(token.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *conn)
            .instrument(span)
            .await
            .map_err(db_error(operation))?;

        if inserted.is_some() {
            return Ok(token);
        }
        warn!(operation, attempt, "token value collided, retrying");
    }

    error!(operation, "token value collided on every attempt");
    Err(StoreError::TokenCollision)
}

async fn delete_token(
    conn: &mut PgConnection,
    operation: &'static str,
    token: Token,
) -> StoreResult<Option<UserId>> {
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = DELETE_TOKEN
    );
    let row = sqlx::query(DELETE_TOKEN)
        .bind(token.as_uuid())
        .fetch_optional(&mut *conn)
        .instrument(span)
        .await
        .map_err(db_error(operation))?;

    row.map(|row| row.try_get::<Uuid, _>("user_id"))
        .transpose()
        .map(|id| id.map(UserId::from_uuid))
        .map_err(db_error(operation))
}

impl PgStore {
    async fn issue_token(&self, user_id: UserId) -> StoreResult<Token> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("create_token"))?;
        insert_token(&mut conn, "create_token", user_id).await
    }

    async fn resolve_token(&self, token: &str) -> StoreResult<Option<UserId>> {
        let Some(token) = Token::parse(token) else {
            return Ok(None);
        };

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = SELECT_TOKEN_OWNER
        );
        let row = sqlx::query(SELECT_TOKEN_OWNER)
            .bind(token.as_uuid())
            .fetch_optional(self.pool())
            .instrument(span)
            .await
            .map_err(db_error("get_user_id"))?;

        row.map(|row| row.try_get::<Uuid, _>("user_id"))
            .transpose()
            .map(|id| id.map(UserId::from_uuid))
            .map_err(db_error("get_user_id"))
    }

    async fn consume_token(&self, token: &str) -> StoreResult<Option<UserId>> {
        let Some(token) = Token::parse(token) else {
            return Ok(None);
        };
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("get_user_id_and_remove_token"))?;
        delete_token(&mut conn, "get_user_id_and_remove_token", token).await
    }

    async fn rotate_token(&self, token: &str) -> StoreResult<Option<(UserId, Token)>> {
        let Some(token) = Token::parse(token) else {
            return Ok(None);
        };

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(db_error("refresh_token"))?;

        let Some(user_id) = delete_token(&mut tx, "refresh_token", token).await? else {
            // Nothing was written; dropping the transaction rolls it back.
            return Ok(None);
        };
        let issued = insert_token(&mut tx, "refresh_token", user_id).await?;

        tx.commit().await.map_err(db_error("refresh_token"))?;
        Ok(Some((user_id, issued)))
    }
}

impl TokenLedger for PgStore {
    fn create_token(&self, user_id: UserId) -> StoreFuture<'_, Token> {
        Box::pin(self.bounded("create_token", self.issue_token(user_id)))
    }

    fn get_user_id<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(self.bounded("get_user_id", self.resolve_token(token)))
    }

    fn get_user_id_and_remove_token<'a>(
        &'a self,
        token: &'a str,
    ) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(self.bounded(
            "get_user_id_and_remove_token",
            self.consume_token(token),
        ))
    }

    fn refresh_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<(UserId, Token)>> {
        Box::pin(self.bounded("refresh_token", self.rotate_token(token)))
    }
}
