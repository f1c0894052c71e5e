//! Cache key construction.
//!
//! A key reads `<method> <path>[?query] origin=<origin|*>[ ext=<ext>][ body=<digest>]`.
//! Origin and extension values are percent-escaped so segments stay separate.
//! Requests that should share a cached response produce the same key, so
//! JSON bodies are canonicalized before hashing and paths are normalized.

use std::fmt;
use std::sync::Arc;

use axum::extract::OriginalUri;
use axum::http::{Method, Uri, header, request};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex characters kept from the body digest
const DIGEST_LEN: usize = 16;

/// Caller supplied key segment, e.g. a tenant or locale taken from a header
pub type KeyExtension = Arc<dyn Fn(&request::Parts) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a request whose body has already been buffered.
    ///
    /// `GET` and `HEAD` never contribute their body; for other methods an
    /// empty body contributes nothing either.
    pub fn build(parts: &request::Parts, body: &[u8], extension: Option<&KeyExtension>) -> Self {
        let mut key = parts.method.as_str().to_ascii_lowercase();
        key.push(' ');
        let uri = request_uri(parts);
        key.push_str(&normalize_path(uri.path()));
        if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
            key.push('?');
            key.push_str(query);
        }

        let origin = parts
            .headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or("*");
        key.push_str(" origin=");
        push_escaped(&mut key, origin);

        if let Some(ext) = extension.and_then(|f| f(parts)) {
            key.push_str(" ext=");
            push_escaped(&mut key, &ext);
        }

        if hashes_body(&parts.method) && !body.is_empty() {
            key.push_str(" body=");
            key.push_str(&body_digest(body));
        }

        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append a client or caller controlled value as one key segment.
///
/// Whitespace and `%` are percent-encoded, so a value can never contain the
/// separator that starts the next segment.
fn push_escaped(key: &mut String, value: &str) {
    for c in value.chars() {
        if c.is_whitespace() || c == '%' {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                key.push_str(&format!("%{byte:02X}"));
            }
        } else {
            key.push(c);
        }
    }
}

/// The URI as the client sent it, before `nest` stripped any prefix
pub fn request_uri(parts: &request::Parts) -> &Uri {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
}

pub(crate) fn hashes_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

/// Collapse repeated slashes and drop one trailing slash (`/` stays `/`).
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    for c in path.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Truncated SHA-256 of the canonical form of a request body
pub fn body_digest(body: &[u8]) -> String {
    let digest = match serde_json::from_slice::<Value>(body) {
        Ok(value) => {
            let mut canonical = String::with_capacity(body.len());
            write_canonical(&value, &mut canonical);
            Sha256::digest(canonical.as_bytes())
        }
        Err(_) => Sha256::digest(body),
    };

    let mut hex = hex::encode(digest);
    hex.truncate(DIGEST_LEN);
    hex
}

// Compact JSON with object keys sorted at every depth
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::from(s).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use proptest::prelude::*;

    fn parts(method: Method, uri: &str, origin: Option<&str>) -> request::Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[test]
    fn test_get_key_format() {
        let key = CacheKey::build(&parts(Method::GET, "/posts//1/?page=2", None), b"ignored", None);
        assert_eq!(key.as_str(), "get /posts/1?page=2 origin=*");
    }

    #[test]
    fn test_origin_discriminates() {
        let a = CacheKey::build(&parts(Method::GET, "/a", Some("https://a.example")), b"", None);
        let b = CacheKey::build(&parts(Method::GET, "/a", Some("https://b.example")), b"", None);
        assert_ne!(a, b);
        assert!(a.as_str().ends_with("origin=https://a.example"));
    }

    #[test]
    fn test_origin_cannot_forge_body_segment() {
        let real = CacheKey::build(
            &parts(Method::POST, "/orders", Some("https://a")),
            br#"{"sku":"x"}"#,
            None,
        );
        let digest = body_digest(br#"{"sku":"x"}"#);
        let forged_origin = format!("https://a body={digest}");
        let forged = CacheKey::build(&parts(Method::POST, "/orders", Some(forged_origin.as_str())), b"", None);

        assert_ne!(real, forged);
        assert_eq!(
            forged.as_str(),
            format!("post /orders origin=https://a%20body={digest}")
        );
    }

    #[test]
    fn test_extension_cannot_forge_segments() {
        let ext: KeyExtension = Arc::new(|parts: &request::Parts| {
            parts
                .headers
                .get("x-tenant")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
        let mut forged = parts(Method::GET, "/a", None);
        forged.headers.insert("x-tenant", "acme ext=other".parse().unwrap());
        let mut encoded = parts(Method::GET, "/a", None);
        encoded.headers.insert("x-tenant", "acme%20ext=other".parse().unwrap());

        let forged = CacheKey::build(&forged, b"", Some(&ext));
        let encoded = CacheKey::build(&encoded, b"", Some(&ext));
        assert_eq!(forged.as_str(), "get /a origin=* ext=acme%20ext=other");
        assert_eq!(encoded.as_str(), "get /a origin=* ext=acme%2520ext=other");
        assert_ne!(forged, encoded);
    }

    #[test]
    fn test_extension_segment() {
        let ext: KeyExtension = Arc::new(|parts: &request::Parts| {
            parts
                .headers
                .get("accept-language")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
        let mut p = parts(Method::GET, "/a", None);
        p.headers.insert("accept-language", "nl".parse().unwrap());

        let key = CacheKey::build(&p, b"", Some(&ext));
        assert_eq!(key.as_str(), "get /a origin=* ext=nl");
    }

    #[test]
    fn test_post_bodies() {
        let p = parts(Method::POST, "/orders", None);
        let a = CacheKey::build(&p, br#"{"qty":1,"sku":"x"}"#, None);
        let b = CacheKey::build(&p, br#"{ "sku": "x", "qty": 1 }"#, None);
        let c = CacheKey::build(&p, br#"{"qty":2,"sku":"x"}"#, None);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("post /orders origin=* body="));
        assert_eq!(a.as_str().rsplit('=').next().unwrap().len(), DIGEST_LEN);
    }

    #[test]
    fn test_non_json_body_hashed_verbatim() {
        assert_ne!(body_digest(b"a=1&b=2"), body_digest(b"b=2&a=1"));
    }

    #[test]
    fn test_original_uri_preferred() {
        let mut p = parts(Method::GET, "/a", None);
        p.extensions.insert(OriginalUri("/cache30s/a".parse().unwrap()));
        let key = CacheKey::build(&p, b"", None);
        assert_eq!(key.as_str(), "get /cache30s/a origin=*");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("//"), "/");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("a"), "/a");
    }

    #[test]
    fn test_canonical_nested() {
        let mut out = String::new();
        write_canonical(&serde_json::json!({"b": [{"y": 1, "x": "\"q\""}], "a": null}), &mut out);
        assert_eq!(out, r#"{"a":null,"b":[{"x":"\"q\"","y":1}]}"#);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,8}".prop_map(Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// Pretty-printing a JSON body does not change its digest.
        #[test]
        fn prop_digest_ignores_formatting(value in arb_json()) {
            let compact = serde_json::to_vec(&value).unwrap();
            let pretty = serde_json::to_vec_pretty(&value).unwrap();
            prop_assert_eq!(body_digest(&compact), body_digest(&pretty));
        }
    }
}
