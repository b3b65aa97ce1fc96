//! GitHub rate-limit bookkeeping.
//!
//! Every GraphQL query in [`crate::github::queries`] requests the
//! `rateLimit { limit remaining cost resetAt }` header so the gateway can
//! surface an accurate `resetAt` instead of guessing, unlike the text-sniffed
//! fallback in [`crate::github::error::classify_octocrab_error`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::github::error::GatewayError;

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub cost: u32,
    #[serde(rename = "resetAt")]
    pub reset_at: DateTime<Utc>,
}

/// Pull the `rateLimit` block out of a GraphQL response's `data` object, if
/// present. Absence is not an error: some queries omit it.
pub fn parse_rate_limit(data: &serde_json::Value) -> Option<RateLimitInfo> {
    data.get("rateLimit")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// If the header reports the budget is exhausted, turn it into a
/// [`GatewayError::RateLimited`] carrying the real reset time.
pub fn check_exhausted(info: &RateLimitInfo) -> Option<GatewayError> {
    if info.remaining == 0 {
        Some(GatewayError::RateLimited {
            reset_at: info.reset_at,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rate_limit_block() {
        let data = serde_json::json!({
            "rateLimit": {
                "limit": 5000,
                "remaining": 10,
                "cost": 1,
                "resetAt": "2026-07-27T12:00:00Z",
            },
            "repository": {}
        });
        let info = parse_rate_limit(&data).unwrap();
        assert_eq!(info.remaining, 10);
    }

    #[test]
    fn missing_rate_limit_block_is_none() {
        let data = serde_json::json!({"repository": {}});
        assert!(parse_rate_limit(&data).is_none());
    }

    #[test]
    fn exhausted_budget_yields_rate_limited_error() {
        let info = RateLimitInfo {
            limit: 5000,
            remaining: 0,
            cost: 1,
            reset_at: Utc::now(),
        };
        assert!(matches!(
            check_exhausted(&info),
            Some(GatewayError::RateLimited { .. })
        ));
    }

    #[test]
    fn nonzero_remaining_is_not_exhausted() {
        let info = RateLimitInfo {
            limit: 5000,
            remaining: 1,
            cost: 1,
            reset_at: Utc::now(),
        };
        assert!(check_exhausted(&info).is_none());
    }
}
