// [apps/worker/src/errors.rs]
//! Executors never bubble a typed error up to a caller the way the HTTP
//! facade's `ApiError` does — every failure is resolved into a concrete job
//! action (complete, retry, reschedule, quarantine) right where it happens,
//! because the right action depends on the job's own state, not just the
//! error variant.

use aegis_domain_connectors::ConnectorError;
use chrono::Duration;

/// What a connector failure means for the job currently holding the
/// connector slot: pause for an exact duration, give up on the whole
/// connection, or treat it as an ordinary retryable failure.
pub enum ConnectorFailureAction {
    RescheduleAfter(Duration),
    QuarantineConnection(String),
    Retry(String),
}

/// `ExpiredCredentials` and `MissingPermissions` never reach this
/// classifier as connection-ending failures: the former is resolved by a
/// refresh attempt (falling through to `PermanentAuthFailure` only once
/// that refresh itself fails), and the latter is a partial-functionality
/// warning, not a broken connector. Both are handled inline by the
/// pagination loop before a connector error ever gets here.
pub fn classify_connector_error(error: &ConnectorError) -> ConnectorFailureAction {
    match error {
        ConnectorError::RateLimited(reset_at) => {
            let delay = *reset_at - chrono::Utc::now();
            ConnectorFailureAction::RescheduleAfter(delay.max(Duration::seconds(1)))
        }
        ConnectorError::PermanentAuthFailure => ConnectorFailureAction::QuarantineConnection(error.to_string()),
        other => ConnectorFailureAction::Retry(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_reschedules_for_at_least_one_second() {
        let reset_at = chrono::Utc::now() - Duration::seconds(30);
        match classify_connector_error(&ConnectorError::RateLimited(reset_at)) {
            ConnectorFailureAction::RescheduleAfter(delay) => assert_eq!(delay, Duration::seconds(1)),
            _ => panic!("expected RescheduleAfter"),
        }
    }

    #[test]
    fn rate_limited_reschedules_for_the_remaining_window() {
        let reset_at = chrono::Utc::now() + Duration::minutes(5);
        match classify_connector_error(&ConnectorError::RateLimited(reset_at)) {
            ConnectorFailureAction::RescheduleAfter(delay) => assert!(delay >= Duration::minutes(4)),
            _ => panic!("expected RescheduleAfter"),
        }
    }

    #[test]
    fn permanent_auth_failure_quarantines_the_connection() {
        assert!(matches!(classify_connector_error(&ConnectorError::PermanentAuthFailure), ConnectorFailureAction::QuarantineConnection(_)));
    }

    #[test]
    fn expired_credentials_is_not_classified_here() {
        // Resolved upstream by the refresh path in the discovery executor;
        // this classifier would otherwise end the connection on a merely
        // stale token before a refresh was ever attempted.
        assert!(matches!(classify_connector_error(&ConnectorError::ExpiredCredentials), ConnectorFailureAction::Retry(_)));
    }

    #[test]
    fn missing_permissions_is_not_classified_here() {
        let error = ConnectorError::MissingPermissions(vec!["admin.read".to_string()]);
        assert!(matches!(classify_connector_error(&error), ConnectorFailureAction::Retry(_)));
    }

    #[test]
    fn transient_platform_error_is_retried() {
        let error = ConnectorError::TransientPlatformError("upstream 503".to_string(), None);
        assert!(matches!(classify_connector_error(&error), ConnectorFailureAction::Retry(_)));
    }

    #[test]
    fn invariant_violation_is_retried() {
        let error = ConnectorError::InvariantViolation("cursor decode mismatch".to_string());
        assert!(matches!(classify_connector_error(&error), ConnectorFailureAction::Retry(_)));
    }
}
