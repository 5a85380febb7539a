use super::{
    ConfigInput, ConfigMap, DEFAULT_CONFIG_FILE_NAME, DEFAULT_LISTEN_ADDR, EffectiveConfig,
    KEY_CERT_FILE, KEY_KEY_FILE, KEY_LISTEN_ADDR, KEY_UPSTREAM_URL, parse_config_file,
};
use crate::error::{ResolveError, UsageError};
use crate::utils::home_dir;
use hyper::Uri;
use std::path::PathBuf;
use tracing::{debug, info};

/// Resolve the effective configuration using the process environment
pub fn resolve(input: &ConfigInput) -> Result<EffectiveConfig, ResolveError> {
    resolve_with_env(input, |name| std::env::var(name).ok())
}

/// Resolve the effective configuration.
///
/// Every field takes the first non-empty value of: command line flag, config
/// file entry. The listen address then falls back to [`DEFAULT_LISTEN_ADDR`]
/// and the upstream to the single positional argument.
///
/// `env` looks up environment variables; it is only consulted to locate the
/// default config file.
pub fn resolve_with_env<F>(input: &ConfigInput, env: F) -> Result<EffectiveConfig, ResolveError>
where
    F: Fn(&str) -> Option<String>,
{
    if input.positional.len() > 1 {
        return Err(UsageError::TooManyArguments(input.positional.len()).into());
    }

    let config_path = input
        .config
        .clone()
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| find_config_file(&env));

    let file = match &config_path {
        Some(path) => {
            let map = parse_config_file(path).map_err(|source| ResolveError::Config {
                path: path.clone(),
                source,
            })?;
            info!("using config file: {}", path.display());
            map
        }
        None => ConfigMap::new(),
    };

    let listen_addr = pick(&input.addr, &file, KEY_LISTEN_ADDR)
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
    let cert_file = pick(&input.cert, &file, KEY_CERT_FILE).map(PathBuf::from);
    let key_file = pick(&input.key, &file, KEY_KEY_FILE).map(PathBuf::from);

    let upstream = pick(&input.upstream, &file, KEY_UPSTREAM_URL)
        .or_else(|| non_empty(input.positional.first().map(String::as_str)))
        .ok_or(UsageError::NoUpstream)?;

    let upstream = parse_upstream(&upstream)?;

    debug!(
        "Resolved configuration - addr: {}, cert: {:?}, key: {:?}, upstream: {}",
        listen_addr, cert_file, key_file, upstream
    );

    Ok(EffectiveConfig {
        listen_addr,
        cert_file,
        key_file,
        upstream,
    })
}

/// Locate `<home>/secure.conf`; returns `None` unless it exists and is not a directory
pub fn find_config_file<F>(env: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let path = home_dir(env)?.join(DEFAULT_CONFIG_FILE_NAME);
    match std::fs::metadata(&path) {
        Ok(meta) if !meta.is_dir() => Some(path),
        _ => None,
    }
}

fn pick(flag: &Option<String>, file: &ConfigMap, key: &str) -> Option<String> {
    non_empty(flag.as_deref()).or_else(|| non_empty(file.get(key)))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn parse_upstream(raw: &str) -> Result<Uri, ResolveError> {
    let invalid = |reason: String| ResolveError::InvalidUpstream {
        url: raw.to_string(),
        reason,
    };

    let uri = raw.parse::<Uri>().map_err(|e| invalid(e.to_string()))?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme {:?}", other))),
        None => return Err(invalid("missing scheme".to_string())),
    }

    if uri.host().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(uri)
}
