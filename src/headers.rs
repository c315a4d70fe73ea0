use std::collections::HashSet;

use once_cell::sync::Lazy;

pub type Headers = Vec<(String, String)>;

pub const REDACTED: &str = "***REDACTED***";

static SENSITIVE_HEADERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "api-key",
        "api_secret",
        "authorization",
        "x-api-key",
        "x-api-secret",
    ]
    .into_iter()
    .collect()
});

pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS.contains(name.to_ascii_lowercase().as_str())
}

/// Returns a copy of `headers` with credential values replaced by [`REDACTED`].
///
/// Key casing and ordering are preserved; the input is left untouched because
/// the caller still needs the real values to send the request.
pub fn sanitize(headers: &[(String, String)]) -> Headers {
    headers
        .iter()
        .map(|(name, value)| {
            if is_sensitive(name) {
                (name.clone(), REDACTED.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}

/// Drops every `Content-Type` header regardless of casing.
pub fn without_content_type(headers: &[(String, String)]) -> Headers {
    headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
        .cloned()
        .collect()
}

/// Layers `overrides` on top of `base`: a base entry whose name matches an
/// override (case-insensitively) is dropped, the rest keep their order.
pub fn layer(base: &[(String, String)], overrides: Headers) -> Headers {
    let present: HashSet<String> = overrides
        .iter()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect();

    let mut result: Headers = base
        .iter()
        .filter(|(name, _)| !present.contains(&name.to_ascii_lowercase()))
        .cloned()
        .collect();
    result.extend(overrides);
    result
}
