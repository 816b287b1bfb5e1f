use super::*;

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.max_retries, 3);
    assert_eq!(policy.backoff_base, Duration::from_secs(1));
    assert_eq!(policy.retry_statuses, vec![429, 500, 502, 503, 504]);
    assert!(!policy.retry_non_idempotent);
}

#[test]
fn test_backoff_doubles_from_base() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
    assert_eq!(policy.backoff_for(2), Duration::from_secs(2));
    assert_eq!(policy.backoff_for(3), Duration::from_secs(4));
}

#[test]
fn test_backoff_is_capped() {
    let policy = RetryPolicy {
        max_backoff: Duration::from_secs(3),
        ..RetryPolicy::default()
    };

    assert_eq!(policy.backoff_for(3), Duration::from_secs(3));
    assert_eq!(policy.backoff_for(40), Duration::from_secs(3));
}

#[test]
fn test_retry_after_overrides_backoff_but_respects_cap() {
    let policy = RetryPolicy::default();

    assert_eq!(
        policy.delay_for(1, Some(Duration::from_secs(7))),
        Duration::from_secs(7)
    );
    assert_eq!(
        policy.delay_for(1, Some(Duration::from_secs(3600))),
        Duration::from_secs(60)
    );
}

#[test]
fn test_only_idempotent_methods_retry_by_default() {
    let policy = RetryPolicy::default();

    assert!(policy.allows_method(&Method::GET));
    assert!(policy.allows_method(&Method::HEAD));
    assert!(!policy.allows_method(&Method::POST));
    assert!(!policy.allows_method(&Method::PUT));
    assert!(!policy.allows_method(&Method::DELETE));
}

#[test]
fn test_non_idempotent_methods_retry_when_enabled() {
    let policy = RetryPolicy {
        retry_non_idempotent: true,
        ..RetryPolicy::default()
    };

    assert!(policy.allows_method(&Method::POST));
    assert!(policy.allows_method(&Method::PUT));
}

#[test]
fn test_retryable_statuses() {
    let policy = RetryPolicy::default();

    assert!(policy.is_retryable_status(503));
    assert!(policy.is_retryable_status(429));
    assert!(!policy.is_retryable_status(404));
    assert!(!policy.is_retryable_status(422));
}
