use secure_proxy::config::{ConfigMap, parse_config, parse_config_file};
use secure_proxy::error::{ConfigError, ParseError};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn parse(content: &str) -> Result<ConfigMap, ConfigError> {
    parse_config(Cursor::new(content))
}

fn expect_parse_error(content: &str) -> ParseError {
    match parse(content) {
        Err(ConfigError::Parse(e)) => e,
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_valid_config() {
    let config = parse("CertFile cert.pem\nKeyFile key.pem\n").unwrap();

    let expected: ConfigMap = [("CertFile", "cert.pem"), ("KeyFile", "key.pem")]
        .into_iter()
        .collect();
    assert_eq!(config, expected);
}

#[test]
fn test_extra_fields_are_ignored() {
    let config = parse("CertFile cert.pem extra\n").unwrap();
    assert_eq!(config.len(), 1);
    assert_eq!(config.get("CertFile"), Some("cert.pem"));
}

#[test]
fn test_whitespace_runs_separate_fields() {
    let config = parse("UpstreamURL \t  http://a.b\t# trailing\n").unwrap();
    assert_eq!(config.get("UpstreamURL"), Some("http://a.b"));
}

#[test]
fn test_single_field_line_fails() {
    let err = expect_parse_error("CertFile\n");
    assert_eq!(err.line_number, 1);
    assert_eq!(err.line, "CertFile");
}

#[test]
fn test_comments_and_blank_lines_count_towards_line_numbers() {
    let err = expect_parse_error("#comment\nKeyFile\n");
    assert_eq!(err.line_number, 2);

    let err = expect_parse_error("\n# a\n\nCertFile cert.pem\nKeyFile\n");
    assert_eq!(err.line_number, 5);
    assert_eq!(err.line, "KeyFile");
}

#[test]
fn test_first_malformed_line_is_reported() {
    let err = expect_parse_error("A\nB\n");
    assert_eq!(err.line_number, 1);
    assert_eq!(err.line, "A");
}

#[test]
fn test_whitespace_only_line_is_malformed() {
    let err = expect_parse_error("A 1\n   \n");
    assert_eq!(err.line_number, 2);
    assert_eq!(err.line, "   ");
}

#[test]
fn test_indented_hash_is_not_a_comment() {
    let config = parse("  # not-a-comment\n").unwrap();
    assert_eq!(config.get("#"), Some("not-a-comment"));
}

#[test]
fn test_duplicate_keys_last_wins() {
    let config = parse("A 1\nA 2\n").unwrap();
    let expected: ConfigMap = [("A", "2")].into_iter().collect();
    assert_eq!(config, expected);
}

#[test]
fn test_keys_are_case_sensitive() {
    let config = parse("certfile a\nCertFile b\n").unwrap();
    assert_eq!(config.get("certfile"), Some("a"));
    assert_eq!(config.get("CertFile"), Some("b"));
}

#[test]
fn test_crlf_line_endings() {
    let config = parse("CertFile cert.pem\r\nKeyFile key.pem\r\n").unwrap();
    assert_eq!(config.get("KeyFile"), Some("key.pem"));

    let err = expect_parse_error("KeyFile\r\n");
    assert_eq!(err.line, "KeyFile");
}

#[test]
fn test_empty_input() {
    let config = parse("").unwrap();
    assert!(config.is_empty());
}

#[test]
fn test_unknown_keys_are_kept() {
    let config = parse("FutureKey value\n").unwrap();
    assert_eq!(config.get("FutureKey"), Some("value"));
}

#[test]
fn test_invalid_utf8_is_a_read_error() {
    let result = parse_config(Cursor::new(vec![b'A', b' ', 0xff, 0xfe, b'\n']));
    assert!(matches!(result, Err(ConfigError::Read(_))));
}

#[test]
fn test_parse_error_display() {
    let err = ParseError {
        line_number: 3,
        line: "KeyFile".to_string(),
    };
    assert_eq!(err.to_string(), "error parsing config at line 3: KeyFile");
}

#[test]
fn test_parse_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"# proxy\nListenAddr :8443\nUpstreamURL https://example.com\n")
        .unwrap();
    file.flush().unwrap();

    let config = parse_config_file(file.path()).unwrap();
    assert_eq!(config.get("ListenAddr"), Some(":8443"));
    assert_eq!(config.get("UpstreamURL"), Some("https://example.com"));
}

#[test]
fn test_parse_config_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.conf");

    let err = parse_config_file(&path).unwrap_err();
    match &err {
        ConfigError::Open { path: reported, .. } => assert_eq!(reported, &path),
        other => panic!("expected open error, got {:?}", other),
    }
    assert!(err.to_string().contains("error opening config file"));
}

#[test]
fn test_parse_config_file_syntax_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"CertFile cert.pem\nbroken\n").unwrap();
    file.flush().unwrap();

    let err = parse_config_file(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Parse(ParseError { line_number: 2, .. })
    ));
}
