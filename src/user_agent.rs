//! Shared User-Agent string for bibliographic source clients.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/journal-matcher";

/// Default User-Agent for source requests.
#[must_use]
pub(crate) fn default_source_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("journal-matcher/{version} (research-tool; +{PROJECT_UA_URL})")
}
