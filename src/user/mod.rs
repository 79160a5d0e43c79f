//! Identity mapping and token lifecycle contracts.
//!
//! An external identity (`login` + `auth_user_type`) maps to exactly one
//! internal [`UserId`]. Tokens are opaque bearer credentials bound to a user
//! id; consuming a token deletes it so it can never resolve again.
//!
//! The traits here are the seam between the HTTP layer and the backing store.
//! They return boxed futures so the store can be shared as `Arc<dyn UserStore>`.

pub mod id;

use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, pin::Pin};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Internal, stable identifier of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Opaque bearer credential bound to a [`UserId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(Uuid);

macro_rules! uuid_newtype {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub const fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse the wire form. Anything that is not a UUID cannot name a
            /// stored record, so it is reported as absent rather than as an error.
            #[must_use]
            pub fn parse(value: &str) -> Option<Self> {
                Uuid::try_parse(value.trim()).ok().map(Self)
            }

            /// Generate a fresh random value.
            ///
            /// # Errors
            /// Returns the OS random source failure.
            pub fn generate() -> Result<Self, rand::Error> {
                id::generate().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }
    };
}

uuid_newtype!(UserId);
uuid_newtype!(Token);

// Tokens are credentials; keep them out of Debug output.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Identity presented by a caller, as asserted by an upstream provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    login: String,
    auth_user_type: String,
    auth_method: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("login must not be empty")]
    EmptyLogin,
    #[error("auth_user_type must not be empty")]
    EmptyAuthUserType,
}

impl ExternalIdentity {
    /// # Errors
    /// Returns a [`ValidationError`] when `login` or `auth_user_type` is blank.
    pub fn new(
        login: impl Into<String>,
        auth_user_type: impl Into<String>,
        auth_method: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let login = login.into();
        let auth_user_type = auth_user_type.into();
        if login.trim().is_empty() {
            return Err(ValidationError::EmptyLogin);
        }
        if auth_user_type.trim().is_empty() {
            return Err(ValidationError::EmptyAuthUserType);
        }
        // Stored verbatim: the pair is the uniqueness key.
        Ok(Self {
            login,
            auth_user_type,
            auth_method: auth_method.into(),
        })
    }

    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    #[must_use]
    pub fn auth_user_type(&self) -> &str {
        &self.auth_user_type
    }

    #[must_use]
    pub fn auth_method(&self) -> &str {
        &self.auth_method
    }
}

impl fmt::Debug for ExternalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalIdentity")
            .field("login", &"***")
            .field("auth_user_type", &self.auth_user_type)
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Read-only projection of an identity record.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PersonalData {
    pub user_id: String,
    pub phone_number: String,
    pub email: String,
}

impl PersonalData {
    /// Project an identity record. Email identities fill `email`; every other
    /// identity type is treated as a phone login.
    #[must_use]
    pub fn from_record(user_id: UserId, login: &str, auth_user_type: &str) -> Self {
        let (phone_number, email) = if auth_user_type.eq_ignore_ascii_case("email") {
            (String::new(), login.to_string())
        } else {
            (login.to_string(), String::new())
        };
        Self {
            user_id: user_id.to_string(),
            phone_number,
            email,
        }
    }
}

/// Failures reported by a store implementation.
///
/// Display strings name the operation only; tokens and logins never appear.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{operation}: store operation timed out")]
    Timeout { operation: &'static str },
    #[error("{operation}: database error")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("{operation}: identifier generation failed")]
    IdentifierGeneration {
        operation: &'static str,
        #[source]
        source: rand::Error,
    },
    #[error("token identifier collided repeatedly")]
    TokenCollision,
}

impl StoreError {
    #[must_use]
    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }

    #[must_use]
    pub fn identifier(operation: &'static str, source: rand::Error) -> Self {
        Self::IdentifierGeneration { operation, source }
    }

    /// Whether the caller may retry under its own policy. A timed-out
    /// refresh is still not retryable; the refresh path handles that itself.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Database { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Maps external identities to durable user ids.
pub trait IdentityRegistry: Send + Sync {
    /// Return the user id for `identity`, creating it on first sight.
    /// Concurrent first-time calls for the same identity converge on one id.
    fn get_or_create_user_id<'a>(&'a self, identity: &'a ExternalIdentity)
    -> StoreFuture<'a, UserId>;
}

/// Issues, resolves and consumes tokens.
pub trait TokenLedger: Send + Sync {
    fn create_token(&self, user_id: UserId) -> StoreFuture<'_, Token>;

    /// Resolve a token. Unknown, consumed, or malformed tokens yield `None`.
    fn get_user_id<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<UserId>>;

    /// Read the owner of `token` and delete it as one atomic step. Of any
    /// number of concurrent callers presenting the same token, at most one
    /// gets `Some`.
    fn get_user_id_and_remove_token<'a>(
        &'a self,
        token: &'a str,
    ) -> StoreFuture<'a, Option<UserId>>;

    /// Consume `token` and issue its replacement in one transaction.
    fn refresh_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<(UserId, Token)>>;
}

pub trait PersonalDataFetcher: Send + Sync {
    /// # Errors
    /// [`StoreError::NotFound`] when no identity record has this user id.
    fn fetch_personal_data<'a>(&'a self, user_id: &'a str) -> StoreFuture<'a, PersonalData>;
}

/// Everything the HTTP layer needs from a store.
pub trait UserStore: IdentityRegistry + TokenLedger + PersonalDataFetcher {}

impl<T: IdentityRegistry + TokenLedger + PersonalDataFetcher> UserStore for T {}

#[cfg(test)]
pub(crate) mod memory;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_identity_keeps_fields_verbatim() -> Result<(), ValidationError> {
        let identity = ExternalIdentity::new("  u1 ", "email", " otp ")?;
        assert_eq!(identity.login(), "  u1 ");
        assert_eq!(identity.auth_user_type(), "email");
        assert_eq!(identity.auth_method(), " otp ");
        Ok(())
    }

    #[test]
    fn external_identity_whitespace_is_part_of_the_key() -> Result<(), ValidationError> {
        let padded = ExternalIdentity::new("alice ", "email", "otp")?;
        let plain = ExternalIdentity::new("alice", "email", "otp")?;
        assert_ne!(padded, plain);
        assert_ne!(padded.login(), plain.login());
        Ok(())
    }

    #[test]
    fn external_identity_rejects_blank_login() {
        assert_eq!(
            ExternalIdentity::new("   ", "email", "otp"),
            Err(ValidationError::EmptyLogin)
        );
    }

    #[test]
    fn external_identity_rejects_blank_user_type() {
        assert_eq!(
            ExternalIdentity::new("u1", "", "otp"),
            Err(ValidationError::EmptyAuthUserType)
        );
    }

    #[test]
    fn external_identity_allows_empty_auth_method() {
        assert!(ExternalIdentity::new("u1", "phone", "").is_ok());
    }

    #[test]
    fn external_identity_debug_hides_login() -> Result<(), ValidationError> {
        let identity = ExternalIdentity::new("secret-login", "email", "otp")?;
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains("secret-login"));
        Ok(())
    }

    #[test]
    fn token_debug_hides_value() -> Result<(), rand::Error> {
        let token = Token::generate()?;
        let rendered = format!("{token:?}");
        assert!(!rendered.contains(&token.to_string()));
        Ok(())
    }

    #[test]
    fn parse_rejects_non_uuid() {
        assert!(Token::parse("not-a-real-token").is_none());
        assert!(UserId::parse("").is_none());
    }

    #[test]
    fn parse_accepts_display_form() -> Result<(), rand::Error> {
        let user_id = UserId::generate()?;
        assert_eq!(UserId::parse(&user_id.to_string()), Some(user_id));
        Ok(())
    }

    #[test]
    fn personal_data_maps_email_identity() -> Result<(), rand::Error> {
        let user_id = UserId::generate()?;
        let data = PersonalData::from_record(user_id, "a@b.c", "Email");
        assert_eq!(data.email, "a@b.c");
        assert!(data.phone_number.is_empty());
        assert_eq!(data.user_id, user_id.to_string());
        Ok(())
    }

    #[test]
    fn personal_data_maps_other_identity_to_phone() -> Result<(), rand::Error> {
        let data = PersonalData::from_record(UserId::generate()?, "+77001112233", "phone");
        assert_eq!(data.phone_number, "+77001112233");
        assert!(data.email.is_empty());
        Ok(())
    }

    #[test]
    fn store_error_retryability() {
        assert!(StoreError::Timeout { operation: "x" }.is_retryable());
        assert!(StoreError::database("x", sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!StoreError::NotFound.is_retryable());
        assert!(!StoreError::TokenCollision.is_retryable());
    }

    #[test]
    fn store_error_display_names_operation() {
        let err = StoreError::Timeout {
            operation: "get_user_id",
        };
        assert_eq!(err.to_string(), "get_user_id: store operation timed out");
    }
}
