//! Conditional request evaluation (`If-None-Match`, `If-Modified-Since`).

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use jiff::Timestamp;
use jiff::fmt::rfc2822::DateTimeParser;

static DATE_PARSER: DateTimeParser = DateTimeParser::new();

/// Headers a `304 Not Modified` carries over from the full response
const KEPT_ON_304: &[header::HeaderName] = &[
    header::CACHE_CONTROL,
    header::CONTENT_LOCATION,
    header::DATE,
    header::ETAG,
    header::EXPIRES,
    header::LAST_MODIFIED,
    header::VARY,
];

/// Whether the client's copy, described by the request's validators, still
/// matches the response.
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when it is absent. A request `Cache-Control: no-cache` is never fresh.
pub fn is_fresh(request: &HeaderMap, response: &HeaderMap) -> bool {
    let if_none_match = request.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    let if_modified_since = request
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok());

    if if_none_match.is_none() && if_modified_since.is_none() {
        return false;
    }

    let no_cache = request
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|d| d.trim().eq_ignore_ascii_case("no-cache")));
    if no_cache {
        return false;
    }

    if let Some(candidates) = if_none_match {
        let etag = response.get(header::ETAG).and_then(|v| v.to_str().ok());
        return etag_matches(candidates, etag);
    }

    let last_modified = response
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);
    match (if_modified_since.and_then(parse_http_date), last_modified) {
        (Some(since), Some(modified)) => modified <= since,
        _ => false,
    }
}

/// Build the `304` counterpart of a response
pub fn not_modified(headers: &HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    for name in KEPT_ON_304 {
        for value in headers.get_all(name) {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    response
}

// Weak comparison: `W/"a"` matches `"a"`
fn etag_matches(candidates: &str, etag: Option<&str>) -> bool {
    if candidates.trim() == "*" {
        return etag.is_some();
    }
    let Some(etag) = etag else {
        return false;
    };
    let etag = strip_weak(etag);
    candidates.split(',').any(|c| strip_weak(c) == etag)
}

fn strip_weak(tag: &str) -> &str {
    let tag = tag.trim();
    tag.strip_prefix("W/").unwrap_or(tag)
}

fn parse_http_date(value: &str) -> Option<Timestamp> {
    DATE_PARSER.parse_timestamp(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_no_validators_is_stale() {
        let response = headers(&[(header::ETAG, "\"v1\"")]);
        assert!(!is_fresh(&HeaderMap::new(), &response));
    }

    #[test]
    fn test_etag_match() {
        let response = headers(&[(header::ETAG, "\"v1\"")]);
        assert!(is_fresh(&headers(&[(header::IF_NONE_MATCH, "\"v0\", W/\"v1\"")]), &response));
        assert!(is_fresh(&headers(&[(header::IF_NONE_MATCH, "*")]), &response));
        assert!(!is_fresh(&headers(&[(header::IF_NONE_MATCH, "\"v2\"")]), &response));
        assert!(!is_fresh(&headers(&[(header::IF_NONE_MATCH, "\"v1\"")]), &HeaderMap::new()));
    }

    #[test]
    fn test_if_none_match_wins_over_date() {
        let response = headers(&[
            (header::ETAG, "\"v2\""),
            (header::LAST_MODIFIED, "Tue, 01 Sep 2026 10:00:00 GMT"),
        ]);
        let request = headers(&[
            (header::IF_NONE_MATCH, "\"v1\""),
            (header::IF_MODIFIED_SINCE, "Wed, 02 Sep 2026 10:00:00 GMT"),
        ]);
        assert!(!is_fresh(&request, &response));
    }

    #[test]
    fn test_modified_since() {
        let response = headers(&[(header::LAST_MODIFIED, "Tue, 01 Sep 2026 10:00:00 GMT")]);
        let later = headers(&[(header::IF_MODIFIED_SINCE, "Wed, 02 Sep 2026 10:00:00 GMT")]);
        let earlier = headers(&[(header::IF_MODIFIED_SINCE, "Mon, 31 Aug 2026 10:00:00 GMT")]);
        let garbage = headers(&[(header::IF_MODIFIED_SINCE, "yesterday")]);

        assert!(is_fresh(&later, &response));
        assert!(!is_fresh(&earlier, &response));
        assert!(!is_fresh(&garbage, &response));
    }

    #[test]
    fn test_no_cache_request() {
        let response = headers(&[(header::ETAG, "\"v1\"")]);
        let request = headers(&[
            (header::IF_NONE_MATCH, "\"v1\""),
            (header::CACHE_CONTROL, "no-cache"),
        ]);
        assert!(!is_fresh(&request, &response));
    }

    #[test]
    fn test_not_modified_keeps_validators_only() {
        let response = headers(&[
            (header::ETAG, "\"v1\""),
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "max-age=60"),
        ]);
        let reply = not_modified(&response);
        assert_eq!(reply.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(reply.headers()[header::ETAG], "\"v1\"");
        assert!(reply.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(reply.headers()[header::CACHE_CONTROL], "max-age=60");
    }
}
