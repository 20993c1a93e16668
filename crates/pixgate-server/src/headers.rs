//! Header allowlists and the security headers stamped on every response.

use http::HeaderMap;
use http::header::{
    ACCEPT, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_SECURITY_POLICY,
    CONTENT_TYPE, ETAG, EXPIRES, HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED, SERVER, TRANSFER_ENCODING, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    X_XSS_PROTECTION,
};

/// Client request headers forwarded to the origin
pub static REQUEST_HEADER_ALLOWLIST: [HeaderName; 4] =
    [ACCEPT, CACHE_CONTROL, IF_MODIFIED_SINCE, IF_NONE_MATCH];

/// Origin response headers forwarded to the client
pub static RESPONSE_HEADER_ALLOWLIST: [HeaderName; 8] = [
    CACHE_CONTROL,
    CONTENT_ENCODING,
    CONTENT_LENGTH,
    CONTENT_TYPE,
    ETAG,
    EXPIRES,
    LAST_MODIFIED,
    TRANSFER_ENCODING,
];

pub const SERVER_NAME: &str = "pixgate";

static SECURITY_HEADERS: [(HeaderName, HeaderValue); 5] = [
    (
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; img-src data:; style-src 'unsafe-inline'"),
    ),
    (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
    (X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
    (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
    (SERVER, HeaderValue::from_static(SERVER_NAME)),
];

/// Set the security headers and `Server`, replacing any existing values
pub fn emit_common_headers(headers: &mut HeaderMap) {
    for (name, value) in &SECURITY_HEADERS {
        headers.insert(name.clone(), value.clone());
    }
}

/// Copy the allow-listed headers present in `src` into `dest`
///
/// A header present in `src` replaces every value `dest` had for it;
/// multi-valued headers keep all their values.
pub fn copy_allowed(dest: &mut HeaderMap, src: &HeaderMap, allowlist: &[HeaderName]) {
    for name in allowlist {
        if !src.contains_key(name) {
            continue;
        }
        dest.remove(name);
        for value in src.get_all(name) {
            dest.append(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_DISPOSITION, COOKIE, SET_COOKIE};

    #[test]
    fn common_headers_override_existing_values() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        headers.insert(SERVER, HeaderValue::from_static("nginx"));

        emit_common_headers(&mut headers);

        assert_eq!(headers[X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[SERVER], "pixgate");
        assert_eq!(headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(
            headers[CONTENT_SECURITY_POLICY],
            "default-src 'none'; img-src data:; style-src 'unsafe-inline'"
        );
    }

    #[test]
    fn only_allowlisted_request_headers_are_copied() {
        let mut src = HeaderMap::new();
        src.insert(ACCEPT, HeaderValue::from_static("image/*"));
        src.insert(IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));
        src.insert(COOKIE, HeaderValue::from_static("session=1"));

        let mut dest = HeaderMap::new();
        copy_allowed(&mut dest, &src, &REQUEST_HEADER_ALLOWLIST);

        assert_eq!(dest.len(), 2);
        assert_eq!(dest[ACCEPT], "image/*");
        assert_eq!(dest[IF_NONE_MATCH], "\"abc\"");
        assert!(!dest.contains_key(COOKIE));
    }

    #[test]
    fn copied_headers_replace_and_keep_all_values() {
        let mut src = HeaderMap::new();
        src.append(CACHE_CONTROL, HeaderValue::from_static("public"));
        src.append(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        src.insert(SET_COOKIE, HeaderValue::from_static("a=b"));

        let mut dest = HeaderMap::new();
        dest.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        dest.insert(CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
        copy_allowed(&mut dest, &src, &RESPONSE_HEADER_ALLOWLIST);

        let cache: Vec<_> = dest.get_all(CACHE_CONTROL).iter().collect();
        assert_eq!(cache, ["public", "max-age=60"]);
        assert_eq!(dest[CONTENT_DISPOSITION], "inline");
        assert!(!dest.contains_key(SET_COOKIE));
    }
}
