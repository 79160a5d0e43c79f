use crate::cli::{
    actions::{Action, server::Args},
    commands::database,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let db_username = matches.get_one::<String>(database::ARG_DB_USERNAME).cloned();
    let db_password = matches
        .get_one::<String>(database::ARG_DB_PASSWORD)
        .map(|password| SecretString::from(password.as_str()));

    let max_connections = matches
        .get_one::<u32>(database::ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let min_connections = matches
        .get_one::<u32>(database::ARG_DB_MIN_CONNECTIONS)
        .copied()
        .unwrap_or(1)
        .min(max_connections);
    let operation_timeout = Duration::from_secs(
        matches
            .get_one::<u64>(database::ARG_DB_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(10),
    );

    Ok(Action::Server(Args {
        port,
        dsn,
        db_username,
        db_password,
        max_connections,
        min_connections,
        operation_timeout,
    }))
}
