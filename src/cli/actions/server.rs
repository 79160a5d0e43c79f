use crate::{api, database};
use anyhow::{Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_username: Option<String>,
    pub db_password: Option<SecretString>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub operation_timeout: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = build_dsn(&args.dsn, args.db_username.as_deref(), args.db_password.as_ref())?;

    log_startup_args(&args, &dsn);

    let config = database::PoolConfig {
        max_connections: args.max_connections,
        min_connections: args.min_connections,
        operation_timeout: args.operation_timeout,
    };
    let pool = database::connect(dsn.expose_secret(), &config).await?;

    api::new(args.port, pool, args.operation_timeout).await
}

/// Inject explicit credentials into the DSN. The result carries the password,
/// so it stays wrapped until handed to the pool.
fn build_dsn(
    dsn: &str,
    username: Option<&str>,
    password: Option<&SecretString>,
) -> Result<SecretString> {
    let mut url = Url::parse(dsn).map_err(|e| anyhow!("Invalid DSN: {e}"))?;

    if let Some(username) = username {
        url.set_username(username)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if let Some(password) = password {
        url.set_password(Some(password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(SecretString::from(url.to_string()))
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_startup_args(args: &Args, dsn: &SecretString) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(dsn.expose_secret())),
        (
            "db_connections",
            format!("{}..{}", args.min_connections, args.max_connections),
        ),
        (
            "operation_timeout",
            format!("{}s", args.operation_timeout.as_secs()),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} ({})\n\nStartup configuration:",
        crate::APP_USER_AGENT,
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
