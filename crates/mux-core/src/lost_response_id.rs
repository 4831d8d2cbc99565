//! Lost-response-id recovery: some providers require echoing a prior
//! response id for reasoning continuity. When one goes stale the provider
//! reports it by name in the error body; we detect that and drop it from
//! the next request rather than surfacing a hard failure.

use once_cell::sync::Lazy;
use regex::Regex;

static LOST_RESPONSE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Previous response with id '([^']+)' not found").unwrap());

/// Returns the stale id if `message` reports it as lost, regardless of
/// whether it arrived as a 4xx or 5xx. The phrase is what matters, not the
/// status code.
pub fn extract_lost_response_id(message: &str) -> Option<String> {
    LOST_RESPONSE_ID
        .captures(message)
        .map(|caps| caps[1].to_string())
}
