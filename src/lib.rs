//! # auth-api
//!
//! `auth-api` maps identities asserted by upstream providers to stable internal
//! user ids and issues opaque bearer tokens bound to them.
//!
//! ## Identity registry
//!
//! An external identity is the pair `(login, auth_user_type)`. The first time
//! a pair is seen a random user id is created for it; every later call returns
//! the same id. Concurrent first-time registrations converge on one id through
//! the `UNIQUE (login, auth_user_type)` constraint and an atomic upsert.
//!
//! ## Token ledger
//!
//! Tokens are random 128-bit values (rendered as UUIDs) stored in `tokens`.
//! They can be resolved any number of times, and consumed exactly once:
//! `DELETE ... RETURNING` lets at most one of any number of concurrent callers
//! observe the owner. A refresh consumes the presented token and issues its
//! replacement in a single transaction.
//!
//! Tokens do not expire; they live until consumed.
//!
//! See `sql/schema.sql` for the schema.

pub mod api;
pub mod cli;
pub mod database;
pub mod user;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
