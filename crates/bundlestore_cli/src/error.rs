use bundlestore_core::{ConfigError, SystemServiceError};
use std::fmt;
use std::process;

pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

pub type CliResult<T> = Result<T, CliError>;

pub enum CliError {
    Config(ConfigError),
    Logging(String),
    Store(String),
    Service(SystemServiceError),
    /// Unreadable or malformed bundle file.
    Input(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(err) => write!(f, "error: {err}"),
            CliError::Logging(msg) => write!(f, "error: logging: {msg}"),
            CliError::Store(msg) => write!(f, "error: {msg}"),
            CliError::Service(err) => write!(f, "error: {err}"),
            CliError::Input(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        CliError::Config(value)
    }
}

impl From<SystemServiceError> for CliError {
    fn from(value: SystemServiceError) -> Self {
        CliError::Service(value)
    }
}

impl From<bundlestore_core::db::DbError> for CliError {
    fn from(value: bundlestore_core::db::DbError) -> Self {
        CliError::Store(value.to_string())
    }
}

pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    let code = match err {
        CliError::Input(_) | CliError::Config(_) => EXIT_USAGE,
        _ => EXIT_ERROR,
    };
    process::exit(code);
}
