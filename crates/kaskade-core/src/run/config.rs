use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::backend::User;
use crate::error::KaskadeError;
use crate::session::store::RunConfigDraft;

/// A validated run configuration, ready to hand to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub target_url: String,
    pub test_duration_seconds: u64,
    pub concurrency: u64,
    pub total_requests: u64,
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^https?://[^\s/$.?#].[^\s]*$").expect("URL pattern is a valid regex")
    })
}

fn parse_positive(raw: &str, field: &str) -> Result<u64, KaskadeError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(KaskadeError::Validation(format!(
            "{field} must be a positive integer"
        ))),
    }
}

/// Check a raw run-config draft against the dispatch preconditions.
///
/// The numeric fields are parsed from their raw string form, so values like
/// `"3.5"` or `"0"` fail with a field-specific message instead of being
/// coerced. An authenticated user is required before any run.
pub fn validate_draft(
    draft: &RunConfigDraft,
    user: Option<&User>,
) -> Result<RunConfig, KaskadeError> {
    if user.is_none() {
        return Err(KaskadeError::Validation("Please log in first.".to_string()));
    }

    if !url_pattern().is_match(draft.target_url.trim()) {
        return Err(KaskadeError::Validation(
            "URL must be a valid string URL".to_string(),
        ));
    }

    Ok(RunConfig {
        target_url: draft.target_url.trim().to_string(),
        test_duration_seconds: parse_positive(&draft.test_duration, "Test duration")?,
        concurrency: parse_positive(&draft.concurrency, "Concurrency")?,
        total_requests: parse_positive(&draft.total_requests, "Total requests")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user() -> User {
        User {
            id: 1,
            username: "jing".to_string(),
            email: "jing@example.com".to_string(),
        }
    }

    fn make_draft() -> RunConfigDraft {
        RunConfigDraft {
            target_url: "http://a.com".to_string(),
            test_duration: "10".to_string(),
            concurrency: "5".to_string(),
            total_requests: "100".to_string(),
        }
    }

    fn validation_message(result: Result<RunConfig, KaskadeError>) -> String {
        match result {
            Err(KaskadeError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_draft_produces_config() {
        let user = make_user();
        let config = validate_draft(&make_draft(), Some(&user)).expect("draft should be valid");
        assert_eq!(
            config,
            RunConfig {
                target_url: "http://a.com".to_string(),
                test_duration_seconds: 10,
                concurrency: 5,
                total_requests: 100,
            }
        );
    }

    #[test]
    fn missing_user_is_rejected_first() {
        let msg = validation_message(validate_draft(&make_draft(), None));
        assert_eq!(msg, "Please log in first.");
    }

    #[test]
    fn bad_url_is_rejected() {
        let user = make_user();
        let mut draft = make_draft();
        draft.target_url = "not-a-url".to_string();
        let msg = validation_message(validate_draft(&draft, Some(&user)));
        assert_eq!(msg, "URL must be a valid string URL");
    }

    #[test]
    fn https_and_mixed_case_scheme_accepted() {
        let user = make_user();
        let mut draft = make_draft();
        draft.target_url = "HTTPS://x.com/path".to_string();
        assert!(validate_draft(&draft, Some(&user)).is_ok());
    }

    #[test]
    fn non_http_scheme_rejected() {
        let user = make_user();
        let mut draft = make_draft();
        draft.target_url = "ftp://x.com".to_string();
        assert!(validate_draft(&draft, Some(&user)).is_err());
    }

    #[test]
    fn zero_duration_invalid_one_valid() {
        let user = make_user();
        let mut draft = make_draft();
        draft.test_duration = "0".to_string();
        let msg = validation_message(validate_draft(&draft, Some(&user)));
        assert_eq!(msg, "Test duration must be a positive integer");

        draft.test_duration = "1".to_string();
        assert!(validate_draft(&draft, Some(&user)).is_ok());
    }

    #[test]
    fn fractional_value_is_rejected() {
        let user = make_user();
        let mut draft = make_draft();
        draft.concurrency = "3.5".to_string();
        let msg = validation_message(validate_draft(&draft, Some(&user)));
        assert_eq!(msg, "Concurrency must be a positive integer");
    }

    #[test]
    fn non_numeric_total_requests_rejected() {
        let user = make_user();
        let mut draft = make_draft();
        draft.total_requests = "lots".to_string();
        let msg = validation_message(validate_draft(&draft, Some(&user)));
        assert_eq!(msg, "Total requests must be a positive integer");
    }

    #[test]
    fn negative_value_is_rejected() {
        let user = make_user();
        let mut draft = make_draft();
        draft.total_requests = "-5".to_string();
        assert!(validate_draft(&draft, Some(&user)).is_err());
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let user = make_user();
        let mut draft = make_draft();
        draft.test_duration = " 10 ".to_string();
        draft.target_url = "http://a.com".to_string();
        assert!(validate_draft(&draft, Some(&user)).is_ok());
    }

    #[test]
    fn config_serializes_camel_case() {
        let user = make_user();
        let config = validate_draft(&make_draft(), Some(&user)).expect("draft should be valid");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"targetUrl\""));
        assert!(json.contains("\"testDurationSeconds\":10"));
        assert!(json.contains("\"totalRequests\":100"));
    }
}
