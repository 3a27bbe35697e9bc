//! Log output setup for binaries embedding the server.

use tracing_subscriber::EnvFilter;

use crate::RealmError;

/// Installs a `fmt` subscriber filtered by `filter`
/// (e.g. `info,realm::activity=debug`).
///
/// # Errors
/// [`RealmError::Config`] if the directive does not parse or a global
/// subscriber is already installed.
pub fn init_logging(filter: &str) -> Result<(), RealmError> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| RealmError::Config(format!("log filter `{filter}`: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| RealmError::Config(format!("logging already initialized: {e}")))
}
