//! Configuration: the `secure.conf` file format and flag/file/default merging.

mod parser;
mod resolve;

pub use parser::{ConfigMap, parse_config, parse_config_file};
pub use resolve::{find_config_file, resolve, resolve_with_env};

use hyper::Uri;
use std::path::PathBuf;

/// File name looked up in the home directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE_NAME: &str = "secure.conf";

/// Listen address used when neither a flag nor the config file sets one
pub const DEFAULT_LISTEN_ADDR: &str = ":443";

/// Config file keys understood by the resolver
pub const KEY_LISTEN_ADDR: &str = "ListenAddr";
pub const KEY_CERT_FILE: &str = "CertFile";
pub const KEY_KEY_FILE: &str = "KeyFile";
pub const KEY_UPSTREAM_URL: &str = "UpstreamURL";

/// Values supplied on the command line, captured once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigInput {
    pub addr: Option<String>,
    pub cert: Option<String>,
    pub config: Option<PathBuf>,
    pub key: Option<String>,
    pub upstream: Option<String>,
    /// Positional arguments; at most one (a fallback upstream URL) is accepted
    pub positional: Vec<String>,
}

/// Fully merged runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    /// Listen address, `host:port` or `:port`
    pub listen_addr: String,
    /// PEM certificate chain, validated when the listener starts
    pub cert_file: Option<PathBuf>,
    /// PEM private key, validated when the listener starts
    pub key_file: Option<PathBuf>,
    /// Absolute http(s) URL of the single upstream origin
    pub upstream: Uri,
}
