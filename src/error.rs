/// Error types for the secure proxy
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error surfaced to `main`, which alone prints and picks the exit code
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The listener or one of its collaborators failed
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Logging could not be initialised
    #[error("Failed to initialize logging: {0:#}")]
    Logging(anyhow::Error),
}

impl AppError {
    /// Usage errors are reported together with the short usage line
    pub fn is_usage(&self) -> bool {
        matches!(self, AppError::Resolve(ResolveError::Usage(_)))
    }

    /// Process exit status for this error: 2 for usage errors, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.is_usage() { 2 } else { 1 }
    }
}

/// Syntax error in a config file: the first malformed line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error parsing config at line {line_number}: {line}")]
pub struct ParseError {
    /// 1-based line number
    pub line_number: usize,
    /// Raw text of the offending line
    pub line: String,
}

/// Config file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named file could not be opened
    #[error("error opening config file {path}: {source}", path = .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading from an already opened source failed
    #[error("error reading config: {0}")]
    Read(#[source] std::io::Error),

    /// A line could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Command line misuse, reported with the usage line and exit status 2
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// More than one positional argument
    #[error("too many arguments: expected at most one upstream url, got {0}")]
    TooManyArguments(usize),

    /// No flag, config entry or positional argument named an upstream
    #[error("no upstream url provided!")]
    NoUpstream,
}

/// Configuration resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The config file was named or discovered but could not be used
    #[error("error parsing config file {path}: {source}", path = .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// The merged upstream is not an absolute http(s) URL
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUpstream { url: String, reason: String },
}

/// Certificate-related errors
#[derive(Error, Debug)]
pub enum CertificateError {
    /// Neither a flag nor the config file named this file
    #[error("No {kind} file configured")]
    NotConfigured { kind: &'static str },

    /// Failed to read a PEM file
    #[error("Failed to read {kind} file {path}: {source}", path = .path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The certificate file holds no certificates
    #[error("No certificates found in {path}", path = .path.display())]
    NoCertificates { path: PathBuf },

    /// The key file holds no private key
    #[error("No private key found in {path}", path = .path.display())]
    NoPrivateKey { path: PathBuf },

    /// rustls rejected the certificate/key pair
    #[error("Invalid certificate/key pair: {0}")]
    Invalid(#[source] rustls::Error),
}

/// Listener and lifecycle errors
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The listener failed for a reason other than shutdown
    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// TLS configuration could not be built
    #[error("TLS error: {0}")]
    Tls(#[source] rustls::Error),

    /// The forwarding handler could not be created
    #[error("Failed to create request handler: {0:#}")]
    Handler(anyhow::Error),

    /// The listener task panicked or was cancelled
    #[error("Listener task failed: {0}")]
    Task(#[source] tokio::task::JoinError),

    /// Signal handlers could not be installed
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type alias for convenience
pub type ProxyResult<T> = Result<T, ProxyError>;
