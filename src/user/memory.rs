//! In-memory store used by handler tests.
//!
//! One mutex guards all state so every trait method is atomic, matching the
//! guarantees the Postgres store gets from constraints and row locks.

use super::{
    ExternalIdentity, IdentityRegistry, PersonalData, PersonalDataFetcher, StoreError,
    StoreFuture, StoreResult, Token, TokenLedger, UserId,
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Fault {
    Timeout,
    Database,
}

struct IdentityRecord {
    user_id: UserId,
    login: String,
    auth_user_type: String,
}

#[derive(Default)]
struct State {
    identities: HashMap<(String, String), IdentityRecord>,
    tokens: HashMap<Token, UserId>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
    fault: Option<Fault>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with `fault`.
    pub(crate) fn failing(fault: Fault) -> Self {
        Self {
            state: Mutex::default(),
            fault: Some(fault),
        }
    }

    pub(crate) fn identity_count(&self) -> usize {
        self.lock().identities.len()
    }

    pub(crate) fn token_count(&self) -> usize {
        self.lock().tokens.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: &'static str) -> StoreResult<()> {
        match self.fault {
            None => Ok(()),
            Some(Fault::Timeout) => Err(StoreError::Timeout { operation }),
            Some(Fault::Database) => Err(StoreError::database(
                operation,
                sqlx::Error::PoolTimedOut,
            )),
        }
    }

    fn issue(state: &mut State, user_id: UserId) -> StoreResult<Token> {
        let token = Token::generate().map_err(|e| StoreError::identifier("create_token", e))?;
        if state.tokens.contains_key(&token) {
            return Err(StoreError::TokenCollision);
        }
        state.tokens.insert(token, user_id);
        Ok(token)
    }
}

impl IdentityRegistry for MemoryStore {
    fn get_or_create_user_id<'a>(
        &'a self,
        identity: &'a ExternalIdentity,
    ) -> StoreFuture<'a, UserId> {
        Box::pin(async move {
            self.check("get_or_create_user_id")?;
            let key = (
                identity.login().to_string(),
                identity.auth_user_type().to_string(),
            );
            let mut state = self.lock();
            if let Some(record) = state.identities.get(&key) {
                return Ok(record.user_id);
            }
            let user_id = UserId::generate()
                .map_err(|e| StoreError::identifier("get_or_create_user_id", e))?;
            state.identities.insert(
                key,
                IdentityRecord {
                    user_id,
                    login: identity.login().to_string(),
                    auth_user_type: identity.auth_user_type().to_string(),
                },
            );
            Ok(user_id)
        })
    }
}

impl TokenLedger for MemoryStore {
    fn create_token(&self, user_id: UserId) -> StoreFuture<'_, Token> {
        Box::pin(async move {
            self.check("create_token")?;
            Self::issue(&mut self.lock(), user_id)
        })
    }

    fn get_user_id<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(async move {
            self.check("get_user_id")?;
            Ok(Token::parse(token).and_then(|token| self.lock().tokens.get(&token).copied()))
        })
    }

    fn get_user_id_and_remove_token<'a>(
        &'a self,
        token: &'a str,
    ) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(async move {
            self.check("get_user_id_and_remove_token")?;
            Ok(Token::parse(token).and_then(|token| self.lock().tokens.remove(&token)))
        })
    }

    fn refresh_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<(UserId, Token)>> {
        Box::pin(async move {
            self.check("refresh_token")?;
            let Some(token) = Token::parse(token) else {
                return Ok(None);
            };
            let mut state = self.lock();
            let Some(user_id) = state.tokens.remove(&token) else {
                return Ok(None);
            };
            let issued = Self::issue(&mut state, user_id)?;
            Ok(Some((user_id, issued)))
        })
    }
}

impl PersonalDataFetcher for MemoryStore {
    fn fetch_personal_data<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, PersonalData> {
        Box::pin(async move {
            self.check("fetch_personal_data")?;
            let user_id = UserId::parse(user_id).ok_or(StoreError::NotFound)?;
            let state = self.lock();
            state
                .identities
                .values()
                .find(|record| record.user_id == user_id)
                .map(|record| {
                    PersonalData::from_record(
                        record.user_id,
                        &record.login,
                        &record.auth_user_type,
                    )
                })
                .ok_or(StoreError::NotFound)
        })
    }
}
