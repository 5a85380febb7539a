use crate::config::ConfigInput;
use crate::logging::LoggingConfig;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Long options that may also be spelled with a single dash (`-addr :8443`,
/// `-cert=c.pem`, `-version`)
const SINGLE_DASH_LONG_FLAGS: [&str; 11] = [
    "addr",
    "cert",
    "config",
    "key",
    "upstream",
    "version",
    "help",
    "log-level",
    "log-json",
    "log-file",
    "log-rotate",
];

/// Command line flags; everything here is optional so the resolver can tell
/// an omitted flag from one that was given.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "secure-proxy",
    version,
    about = "Minimal TLS termination proxy for a single upstream"
)]
pub struct Cli {
    /// Host and port to listen on [default: :443]
    #[arg(long, value_name = "[HOST]:PORT")]
    pub addr: Option<String>,

    /// Path to the PEM certificate chain
    #[arg(long, value_name = "CERTFILE")]
    pub cert: Option<String>,

    /// Path to config file [default: $HOME/secure.conf]
    #[arg(long, value_name = "CONF")]
    pub config: Option<PathBuf>,

    /// Path to the PEM private key
    #[arg(long, value_name = "KEYFILE")]
    pub key: Option<String>,

    /// Upstream URL; takes precedence over the config file and the positional argument
    #[arg(long, value_name = "URL")]
    pub upstream: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Roll the log file daily
    #[arg(long, requires = "log_file")]
    pub log_rotate: bool,

    /// Upstream URL when neither --upstream nor the config file sets one
    #[arg(value_name = "UPSTREAM")]
    pub positional: Vec<String>,
}

impl Cli {
    /// Parse the process arguments, accepting single-dash long flags
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Flag values for the configuration resolver
    pub fn config_input(&self) -> ConfigInput {
        ConfigInput {
            addr: self.addr.clone(),
            cert: self.cert.clone(),
            config: self.config.clone(),
            key: self.key.clone(),
            upstream: self.upstream.clone(),
            positional: self.positional.clone(),
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json: self.log_json,
            file: self.log_file.clone(),
            rotation: self.log_rotate,
        }
    }
}

/// One-line usage summary printed with usage errors
pub fn short_usage() -> String {
    Cli::command().render_usage().to_string()
}

/// Rewrite single-dash long flags to their `--` form.
///
/// Only names in [`SINGLE_DASH_LONG_FLAGS`] are touched, everything after a
/// bare `--` is left alone, and `--flag` spellings pass through unchanged.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut options_done = false;

    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if options_done {
                return arg;
            }
            if arg == "--" {
                options_done = true;
                return arg;
            }
            match arg.to_str() {
                Some(text) if is_single_dash_long_flag(text) => OsString::from(format!("-{}", text)),
                _ => arg,
            }
        })
        .collect()
}

fn is_single_dash_long_flag(arg: &str) -> bool {
    let Some(flag) = arg.strip_prefix('-') else {
        return false;
    };
    if flag.starts_with('-') {
        return false;
    }
    let name = flag.split_once('=').map_or(flag, |(name, _)| name);
    SINGLE_DASH_LONG_FLAGS.contains(&name)
}
