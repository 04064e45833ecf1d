//! Best-effort candidate identity: the first e-mail address in the text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel used when a résumé carries no address.
pub const DEFAULT_IDENTITY: &str = "unknown@example.com";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+").expect("email regex")
});

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

pub fn identity_or_default(text: &str, default: &str) -> String {
    extract_email(text).unwrap_or_else(|| default.to_string())
}
