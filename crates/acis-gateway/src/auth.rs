use acis_core::config::ServerConfig;

/// Check a bearer token against the configured one.
///
/// With no token configured every request is allowed.
pub fn validate_bearer(config: &ServerConfig, bearer: Option<&str>) -> bool {
    match config.token.as_deref().filter(|t| !t.is_empty()) {
        None => true,
        Some(expected) => bearer.is_some_and(|b| constant_time_eq(b.as_bytes(), expected.as_bytes())),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Pull the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
