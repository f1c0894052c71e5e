//! CORS headers on replayed responses

use axum::http::{HeaderMap, HeaderValue, header};

use crate::routing::CorsPolicy;

/// Echo the request origin when the route's policy allows it.
///
/// Nothing is added without a policy or without an `Origin` header.
pub fn apply(headers: &mut HeaderMap, policy: Option<&CorsPolicy>, origin: Option<&HeaderValue>) {
    let (Some(policy), Some(origin)) = (policy, origin) else {
        return;
    };
    let Ok(origin_str) = origin.to_str() else {
        return;
    };

    if policy.allows(origin_str) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    #[test]
    fn test_allowed_origin_is_echoed() {
        let policy = CorsPolicy::Origins(vec!["https://a.example".into()]);
        let mut headers = HeaderMap::new();
        apply(&mut headers, Some(&policy), Some(&origin("https://a.example")));

        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://a.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[test]
    fn test_any_echoes_request_origin() {
        let mut headers = HeaderMap::new();
        apply(&mut headers, Some(&CorsPolicy::Any), Some(&origin("https://z.example")));
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://z.example");
    }

    #[test]
    fn test_nothing_added() {
        let policy = CorsPolicy::Origins(vec!["https://a.example".into()]);

        let mut headers = HeaderMap::new();
        apply(&mut headers, Some(&policy), Some(&origin("https://evil.example")));
        apply(&mut headers, Some(&policy), None);
        apply(&mut headers, None, Some(&origin("https://a.example")));
        assert!(headers.is_empty());
    }
}
