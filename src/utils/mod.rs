/// Small helpers shared by the config resolver and the listener
pub mod backoff;

pub use backoff::{BackoffCounter, exponential_backoff};

use std::path::PathBuf;

/// Environment variables consulted for the home directory, first match wins
pub const HOME_ENV_VARS: [&str; 2] = ["HOME", "USERPROFILE"];

/// Home directory of the current user, looked up through `env`
pub fn home_dir<F>(env: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    HOME_ENV_VARS
        .iter()
        .filter_map(|name| env(name))
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Port of a listen address with an empty host (`:443`), which means every
/// interface
pub fn wildcard_port(addr: &str) -> Option<&str> {
    addr.strip_prefix(':')
}
