//! Stored form of a captured response.

use axum::body::{Body, Bytes};
use axum::http::{HeaderName, HeaderValue, StatusCode, header, response};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::cache::CacheError;

/// Hop-by-hop headers describe one connection, not the response
const HOP_BY_HOP: &[HeaderName] = &[header::CONNECTION, header::TRANSFER_ENCODING, header::UPGRADE];

/// Status, headers in wire order, and body of a response.
///
/// Serialized as JSON with the body base64-encoded:
/// `{"status":200,"headers":[["content-type","text/plain"]],"body":"aGk="}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl CacheEntry {
    /// Snapshot a response that has been fully buffered
    pub fn capture(parts: &response::Parts, body: &Bytes) -> Self {
        let headers = parts
            .headers
            .iter()
            .filter(|(name, _)| !HOP_BY_HOP.contains(name))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        Self {
            status: parts.status.as_u16(),
            headers,
            body: body.to_vec(),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, CacheError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, CacheError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Rebuild the response. Fails on data no response could have produced,
    /// which callers treat as a miss.
    pub fn into_response(self) -> Result<Response, CacheError> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| CacheError::Serialization(format!("stored status {}: {e}", self.status)))?;

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| CacheError::Serialization(format!("stored header '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| CacheError::Serialization(format!("stored value of '{name}': {e}")))?;
            headers.append(name, value);
        }

        Ok(response)
    }
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_parts(headers: &[(&str, &str)]) -> response::Parts {
        let mut builder = axum::http::Response::builder().status(StatusCode::CREATED);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_json_layout() {
        let entry = CacheEntry {
            status: 200,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: b"hi".to_vec(),
        };
        let json: serde_json::Value = serde_json::from_slice(&entry.to_vec().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": 200, "headers": [["content-type", "text/plain"]], "body": "aGk="})
        );
    }

    #[test]
    fn test_capture_keeps_repeated_headers_and_drops_hop_by_hop() {
        let parts = response_parts(&[
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
            ("transfer-encoding", "chunked"),
            ("content-type", "application/json"),
        ]);
        let entry = CacheEntry::capture(&parts, &Bytes::from_static(b"{}"));

        assert_eq!(entry.status, 201);
        assert_eq!(
            entry.headers,
            vec![
                ("set-cookie".to_string(), "a=1".to_string()),
                ("set-cookie".to_string(), "b=2".to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ]
        );

        let response = entry.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_malformed_data() {
        assert!(CacheEntry::from_slice(b"not json").is_err());
        assert!(CacheEntry::from_slice(br#"{"status":200,"headers":[],"body":"%%"}"#).is_err());

        let bad_status = CacheEntry {
            status: 42,
            headers: vec![],
            body: vec![],
        };
        assert!(bad_status.into_response().is_err());

        let bad_header = CacheEntry {
            status: 200,
            headers: vec![("bad header".into(), "x".into())],
            body: vec![],
        };
        assert!(bad_header.into_response().is_err());
    }
}
