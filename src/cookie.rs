//! The cookie bridge: the browser talks to us with `api_token`, we talk to
//! the upstream API with `jwt_token`. Both carry the same token value; the
//! translation happens here and in the login handler.

/// Name of the local session cookie owned by the auth relay handlers.
pub const SESSION_COOKIE: &str = "api_token";

/// Cookie name the upstream API expects the session token under.
pub const UPSTREAM_COOKIE: &str = "jwt_token";

/// Set-Cookie value that clears the local session cookie.
pub const CLEAR_COOKIE: &str =
    "api_token=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly";

/// Scans a semicolon-delimited `Cookie` header for the local session cookie
/// and returns its value verbatim. No URL decoding is applied.
pub fn read_token(cookie_header: Option<&str>) -> Option<&str> {
    cookie_header?
        .split(';')
        .find_map(|part| part.trim_start().strip_prefix("api_token="))
        .filter(|value| !value.is_empty())
}

/// Set-Cookie value minting the local session cookie. No explicit expiry:
/// the token lives as long as the browser session.
pub fn session_cookie(token: &str) -> String {
    format!("api_token={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// Extracts the upstream session token from an upstream `Set-Cookie` header
/// value, i.e. the `jwt_token=` entry up to the next attribute.
pub fn upstream_token(set_cookie: &str) -> Option<&str> {
    let start = set_cookie.find("jwt_token=")? + UPSTREAM_COOKIE.len() + 1;
    let rest = &set_cookie[start..];
    let value = rest.split(';').next().unwrap_or(rest);
    (!value.is_empty()).then_some(value)
}

/// `Cookie` header value presented to the upstream API on authenticated
/// outbound calls.
pub fn upstream_cookie(token: &str) -> String {
    format!("jwt_token={token}")
}
