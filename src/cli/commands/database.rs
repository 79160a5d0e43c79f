use clap::{Arg, Command};

pub const ARG_DB_USERNAME: &str = "db-username";
pub const ARG_DB_PASSWORD: &str = "db-password";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";
pub const ARG_DB_MIN_CONNECTIONS: &str = "db-min-connections";
pub const ARG_DB_TIMEOUT_SECONDS: &str = "db-timeout-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DB_USERNAME)
                .long("db-username")
                .help("Database username, overrides the one in the DSN")
                .env("AUTH_API_DB_USERNAME"),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long("db-password")
                .help("Database password, overrides the one in the DSN")
                .env("AUTH_API_DB_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long("db-max-connections")
                .help("Maximum number of pooled database connections")
                .default_value("5")
                .env("AUTH_API_DB_MAX_CONNECTIONS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_DB_MIN_CONNECTIONS)
                .long("db-min-connections")
                .help("Minimum number of idle database connections")
                .default_value("1")
                .env("AUTH_API_DB_MIN_CONNECTIONS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_DB_TIMEOUT_SECONDS)
                .long("db-timeout-seconds")
                .help("Deadline for a single store operation, in seconds")
                .default_value("10")
                .env("AUTH_API_DB_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
