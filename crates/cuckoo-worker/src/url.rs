//! Recovery for URLs the sandbox would refuse.

use tracing::debug;
use url::form_urlencoded;

/// Make a URL acceptable for submission.
///
/// A URL that is valid generic URI syntax is returned untouched. Otherwise
/// everything after the first `?` is percent-encoded and reattached to the
/// unmodified prefix. This is attempted once; the result is not validated
/// again.
#[must_use]
pub fn prepare_url(raw: &str) -> String {
    if is_valid_uri(raw) {
        return raw.to_string();
    }
    match raw.split_once('?') {
        Some((prefix, query)) => {
            let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
            debug!(url = raw, "percent-encoding query of invalid URL");
            format!("{prefix}?{encoded}")
        }
        None => raw.to_string(),
    }
}

/// Checks a URL against generic URI syntax.
///
/// Every character must be one RFC 3986 allows, percent signs must start a
/// `%XX` escape and there is at most one `#`.
#[must_use]
pub fn is_valid_uri(raw: &str) -> bool {
    if url::Url::parse(raw).is_err() || raw.matches('#').count() > 1 {
        return false;
    }
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let escape = bytes.get(i + 1..i + 3);
                if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    return false;
                }
                i += 3;
            }
            b if is_uri_char(b) => i += 1,
            _ => return false,
        }
    }
    true
}

const fn is_uri_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            // unreserved
            b'-' | b'.' | b'_' | b'~'
            // gen-delims
            | b':' | b'/' | b'?' | b'#' | b'[' | b']' | b'@'
            // sub-delims
            | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
        )
}
