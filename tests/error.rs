use secure_proxy::error::{
    AppError, CertificateError, ConfigError, ParseError, ProxyError, ResolveError, UsageError,
};
use std::io;
use std::path::PathBuf;

#[test]
fn test_usage_errors_exit_with_2() {
    let err = AppError::from(ResolveError::from(UsageError::NoUpstream));
    assert!(err.is_usage());
    assert_eq!(err.exit_code(), 2);
    assert_eq!(err.to_string(), "no upstream url provided!");

    let err = AppError::from(ResolveError::from(UsageError::TooManyArguments(3)));
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("got 3"));
}

#[test]
fn test_config_errors_exit_with_1() {
    let err = AppError::from(ResolveError::Config {
        path: PathBuf::from("/etc/secure.conf"),
        source: ConfigError::Parse(ParseError {
            line_number: 4,
            line: "KeyFile".to_string(),
        }),
    });
    assert!(!err.is_usage());
    assert_eq!(err.exit_code(), 1);
    assert_eq!(
        err.to_string(),
        "error parsing config file /etc/secure.conf: error parsing config at line 4: KeyFile"
    );
}

#[test]
fn test_invalid_upstream_message() {
    let err = ResolveError::InvalidUpstream {
        url: "ftp://x".to_string(),
        reason: "scheme must be http or https".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "invalid upstream url \"ftp://x\": scheme must be http or https"
    );
    assert_eq!(AppError::from(err).exit_code(), 1);
}

#[test]
fn test_bind_error_exits_with_1() {
    let err = AppError::from(ProxyError::Bind {
        addr: ":443".to_string(),
        source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
    });
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("Failed to bind :443"));
}

#[test]
fn test_certificate_error_messages() {
    let err = ProxyError::from(CertificateError::NotConfigured { kind: "key" });
    assert_eq!(err.to_string(), "Certificate error: No key file configured");

    let err = CertificateError::Read {
        kind: "certificate",
        path: PathBuf::from("/tls/cert.pem"),
        source: io::Error::new(io::ErrorKind::NotFound, "not found"),
    };
    assert!(err.to_string().contains("/tls/cert.pem"));
}

#[test]
fn test_logging_error() {
    let err = AppError::Logging(anyhow::anyhow!("directory missing"));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("directory missing"));
}
