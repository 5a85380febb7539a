use secure_proxy::utils::{BackoffCounter, exponential_backoff, home_dir, wildcard_port};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_exponential_backoff_doubles() {
    assert_eq!(exponential_backoff(0, 100, 10000), Duration::from_millis(100));
    assert_eq!(exponential_backoff(1, 100, 10000), Duration::from_millis(200));
    assert_eq!(exponential_backoff(2, 100, 10000), Duration::from_millis(400));
    assert_eq!(exponential_backoff(3, 100, 10000), Duration::from_millis(800));
}

#[test]
fn test_exponential_backoff_max_delay() {
    let delay = exponential_backoff(20, 100, 1000);
    assert_eq!(delay, Duration::from_millis(1000));
}

#[test]
fn test_exponential_backoff_cap_at_10() {
    // Attempts beyond 10 are treated as 10
    let delay_10 = exponential_backoff(10, 1, u64::MAX);
    let delay_20 = exponential_backoff(20, 1, u64::MAX);
    assert_eq!(delay_10, Duration::from_millis(1024));
    assert_eq!(delay_10, delay_20);
}

#[test]
fn test_exponential_backoff_saturates() {
    let delay = exponential_backoff(10, u64::MAX, u64::MAX);
    assert_eq!(delay, Duration::from_millis(u64::MAX));
}

#[test]
fn test_backoff_counter_sequence() {
    let counter = BackoffCounter::new();
    assert_eq!(counter.attempts(), 0);

    assert_eq!(counter.next_delay(5, 1000), Duration::from_millis(5));
    assert_eq!(counter.next_delay(5, 1000), Duration::from_millis(10));
    assert_eq!(counter.next_delay(5, 1000), Duration::from_millis(20));
    assert_eq!(counter.attempts(), 3);
}

#[test]
fn test_backoff_counter_reset() {
    let counter = BackoffCounter::default();
    for _ in 0..5 {
        counter.next_delay(5, 1000);
    }
    counter.reset();

    assert_eq!(counter.attempts(), 0);
    assert_eq!(counter.next_delay(5, 1000), Duration::from_millis(5));
}

#[test]
fn test_backoff_counter_is_capped() {
    let counter = BackoffCounter::new();
    let delays: Vec<_> = (0..12).map(|_| counter.next_delay(5, 1000)).collect();
    assert_eq!(delays.last(), Some(&Duration::from_millis(1000)));
}

#[test]
fn test_home_dir_prefers_home() {
    let env = |name: &str| match name {
        "HOME" => Some("/home/proxy".to_string()),
        "USERPROFILE" => Some("C:\\Users\\proxy".to_string()),
        _ => None,
    };
    assert_eq!(home_dir(env), Some(PathBuf::from("/home/proxy")));
}

#[test]
fn test_home_dir_falls_back_to_userprofile() {
    let env = |name: &str| match name {
        "HOME" => Some(String::new()),
        "USERPROFILE" => Some("C:\\Users\\proxy".to_string()),
        _ => None,
    };
    assert_eq!(home_dir(env), Some(PathBuf::from("C:\\Users\\proxy")));
}

#[test]
fn test_home_dir_unset() {
    assert_eq!(home_dir(|_: &str| None), None);
}

#[test]
fn test_wildcard_port() {
    assert_eq!(wildcard_port(":443"), Some("443"));
    assert_eq!(wildcard_port(":0"), Some("0"));
    assert_eq!(wildcard_port("127.0.0.1:8443"), None);
    assert_eq!(wildcard_port("[::1]:8443"), None);
    assert_eq!(wildcard_port("localhost:80"), None);
}
