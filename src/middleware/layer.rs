//! The caching [`Layer`] and the [`Service`] it wraps handlers in.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode, header, request};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use futures::{StreamExt, stream};
use regex::Regex;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::config::{ConfigError, InterceptorConfig};
use crate::middleware::entry::CacheEntry;
use crate::middleware::key::{CacheKey, KeyExtension, hashes_body, normalize_path, request_uri};
use crate::middleware::{cors, freshness};
use crate::routing::RouteTable;

/// Caches responses of the wrapped service according to the route table.
///
/// Cloning is cheap; every clone shares the cache backend and routes.
#[derive(Clone)]
pub struct CacheLayer {
    cache: CacheManager,
    routes: Arc<RouteTable>,
    body_limit: usize,
    conditional: bool,
    ttl: Option<u64>,
    skip: Option<Regex>,
    key_extension: Option<KeyExtension>,
}

impl CacheLayer {
    pub fn new(cache: CacheManager, routes: Arc<RouteTable>, config: &InterceptorConfig) -> Self {
        Self {
            cache,
            routes,
            body_limit: config.body_limit,
            conditional: config.conditional,
            ttl: None,
            skip: None,
            key_extension: None,
        }
    }

    /// Cache every response passing through this layer for `seconds`,
    /// whatever the route table says. Zero restores table lookup.
    pub fn ttl(self, seconds: u64) -> Self {
        Self {
            ttl: Some(seconds).filter(|s| *s > 0),
            ..self
        }
    }

    /// Bypass the cache for paths matching `pattern` (unanchored regex).
    pub fn skip(self, pattern: &str) -> Result<Self, ConfigError> {
        let skip = Regex::new(pattern).map_err(|e| ConfigError::ValidationError {
            field: "skip".to_string(),
            message: format!("Invalid skip pattern '{pattern}': {e}"),
        })?;
        Ok(Self {
            skip: Some(skip),
            ..self
        })
    }

    /// Add a caller defined segment to every cache key
    pub fn key_extension<F>(self, extension: F) -> Self
    where
        F: Fn(&request::Parts) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key_extension: Some(Arc::new(extension)),
            ..self
        }
    }

    pub(crate) fn with_key_extension(self, extension: Option<KeyExtension>) -> Self {
        Self {
            key_extension: extension,
            ..self
        }
    }

    async fn intercept<S>(&self, inner: S, request: Request) -> Response
    where
        S: Service<Request, Response = Response, Error = Infallible>,
    {
        let (parts, body) = request.into_parts();
        let path = normalize_path(request_uri(&parts).path());

        if self.skip.as_ref().is_some_and(|skip| skip.is_match(&path)) {
            debug!(path = %path, "Skip pattern matched, bypassing cache");
            return call(inner, Request::from_parts(parts, body)).await;
        }

        let Some(route) = self.routes.resolve(&parts.method, &path, self.ttl) else {
            return call(inner, Request::from_parts(parts, body)).await;
        };
        let ttl = route.ttl;
        let cors_policy = route.cors.cloned();

        let (body, body_bytes) = if hashes_body(&parts.method) {
            match axum::body::to_bytes(body, self.body_limit).await {
                Ok(bytes) => (Body::from(bytes.clone()), bytes),
                Err(e) => {
                    debug!(error = %e, "Request body over limit");
                    return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
                }
            }
        } else {
            (body, Bytes::new())
        };

        let key = CacheKey::build(&parts, &body_bytes, self.key_extension.as_ref());
        let conditional = self.conditional && !hashes_body(&parts.method);

        if let Some(mut response) = self.lookup(&key).await {
            debug!(key = %key, "Cache hit");
            let origin = parts.headers.get(header::ORIGIN);
            if conditional && freshness::is_fresh(&parts.headers, response.headers()) {
                response = freshness::not_modified(response.headers());
            }
            cors::apply(response.headers_mut(), cors_policy.as_ref(), origin);
            return response;
        }

        debug!(key = %key, ttl, "Cache miss");
        let request_headers = conditional.then(|| parts.headers.clone());
        let response = call(inner, Request::from_parts(parts, body)).await;
        let response = self.store(&key, ttl, response).await;

        match request_headers {
            Some(headers) if freshness::is_fresh(&headers, response.headers()) => {
                freshness::not_modified(response.headers())
            }
            _ => response,
        }
    }

    /// Cached response for `key`; backend errors and unusable data are misses.
    async fn lookup(&self, key: &CacheKey) -> Option<Response> {
        let data = match self.cache.get(key.as_str()).await {
            Ok(data) => data?,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        match CacheEntry::from_slice(&data).and_then(CacheEntry::into_response) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding malformed cache entry");
                None
            }
        }
    }

    /// Buffer a cacheable response, store it, and hand it on
    async fn store(&self, key: &CacheKey, ttl: u64, response: Response) -> Response {
        if !response.status().is_success() || forbids_storing(response.headers()) {
            return response;
        }
        if response
            .body()
            .size_hint()
            .upper()
            .is_some_and(|len| len > self.body_limit as u64)
        {
            debug!(key = %key, limit = self.body_limit, "Response body over limit, not caching");
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = match buffer_body(body, self.body_limit).await {
            Buffered::Complete(bytes) => bytes,
            Buffered::Oversized(body) => {
                debug!(key = %key, limit = self.body_limit, "Response body over limit, not caching");
                return Response::from_parts(parts, body);
            }
            Buffered::Failed(body, e) => {
                warn!(key = %key, error = %e, "Response body failed mid-stream, not caching");
                return Response::from_parts(parts, body);
            }
        };

        if !bytes.is_empty() {
            let stored = CacheEntry::capture(&parts, &bytes).to_vec();
            match stored {
                Ok(data) => match self.cache.set(key.as_str(), data, ttl).await {
                    Ok(()) => debug!(key = %key, ttl, "Response cached"),
                    Err(e) => warn!(key = %key, error = %e, "Failed to store response"),
                },
                Err(e) => warn!(key = %key, error = %e, "Failed to encode response"),
            }
        }

        Response::from_parts(parts, Body::from(bytes))
    }
}

impl fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLayer")
            .field("cache", &self.cache)
            .field("routes", &self.routes.len())
            .field("ttl", &self.ttl)
            .field("skip", &self.skip.as_ref().map(Regex::as_str))
            .field("key_extension", &self.key_extension.is_some())
            .finish()
    }
}

/// Outcome of reading a response body up to the body limit
enum Buffered {
    Complete(Bytes),
    /// Limit crossed; the body replays what was read, then the rest
    Oversized(Body),
    /// The body errored; the body replays what was read, then the error
    Failed(Body, axum::Error),
}

async fn buffer_body(body: Body, limit: usize) -> Buffered {
    let mut frames = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut len = 0usize;

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(chunk) => {
                len += chunk.len();
                chunks.push(chunk);
                if len > limit {
                    let read = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
                    return Buffered::Oversized(Body::from_stream(read.chain(frames)));
                }
            }
            Err(e) => {
                let message = e.to_string();
                let read = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
                let failed = stream::once(async move { Err(axum::Error::new(message)) });
                return Buffered::Failed(Body::from_stream(read.chain(failed)), e);
            }
        }
    }

    match chunks.len() {
        0 => Buffered::Complete(Bytes::new()),
        1 => Buffered::Complete(chunks.swap_remove(0)),
        _ => Buffered::Complete(Bytes::from(chunks.concat())),
    }
}

/// `Cache-Control: no-store` or `private` keeps a response out of the cache
fn forbids_storing(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|directive| directive.split('=').next().unwrap_or_default().trim())
        .any(|d| d.eq_ignore_ascii_case("no-store") || d.eq_ignore_ascii_case("private"))
}

async fn call<S>(mut inner: S, request: Request) -> Response
where
    S: Service<Request, Response = Response, Error = Infallible>,
{
    match inner.call(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = CacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheService<S> {
    inner: S,
    layer: CacheLayer,
}

impl<S> Service<Request> for CacheService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The clone may not be ready; keep the one that was polled
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let layer = self.layer.clone();

        Box::pin(async move { Ok(layer.intercept(inner, request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn cache_control(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_forbids_storing() {
        assert!(forbids_storing(&cache_control("no-store")));
        assert!(forbids_storing(&cache_control("max-age=0, Private")));
        assert!(forbids_storing(&cache_control("private=\"set-cookie\"")));
        assert!(!forbids_storing(&cache_control("public, max-age=60")));
        assert!(!forbids_storing(&HeaderMap::new()));
    }

    fn chunked(parts: &[&'static str]) -> Body {
        let chunks: Vec<Result<&'static str, std::io::Error>> = parts.iter().map(|p| Ok(*p)).collect();
        Body::from_stream(stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_buffer_body_within_limit() {
        match buffer_body(chunked(&["abc", "def"]), 16).await {
            Buffered::Complete(bytes) => assert_eq!(&bytes[..], b"abcdef"),
            _ => panic!("expected a complete body"),
        }
    }

    #[tokio::test]
    async fn test_buffer_body_over_limit_replays_everything() {
        let body = chunked(&["0123456789", "0123456789", "tail"]);
        let Buffered::Oversized(body) = buffer_body(body, 16).await else {
            panic!("expected an oversized body");
        };
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"01234567890123456789tail");
    }

    #[tokio::test]
    async fn test_buffer_body_error_is_forwarded() {
        let chunks: Vec<Result<&'static str, std::io::Error>> =
            vec![Ok("partial"), Err(std::io::Error::other("upstream reset"))];
        let Buffered::Failed(body, err) = buffer_body(Body::from_stream(stream::iter(chunks)), 1024).await
        else {
            panic!("expected a failed body");
        };
        assert!(err.to_string().contains("upstream reset"));

        let mut frames = body.into_data_stream();
        assert_eq!(&frames.next().await.unwrap().unwrap()[..], b"partial");
        assert!(frames.next().await.unwrap().is_err());
    }

    #[test]
    fn test_invalid_skip_pattern() {
        let layer = CacheLayer::new(
            CacheManager::with_backend(Arc::new(crate::cache::NoOpCache)),
            Arc::new(RouteTable::default()),
            &InterceptorConfig::default(),
        );
        let err = layer.skip("(unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "skip"));
    }

    #[test]
    fn test_zero_ttl_means_no_override() {
        let layer = CacheLayer::new(
            CacheManager::with_backend(Arc::new(crate::cache::NoOpCache)),
            Arc::new(RouteTable::default()),
            &InterceptorConfig::default(),
        );
        assert_eq!(layer.clone().ttl(0).ttl, None);
        assert_eq!(layer.ttl(30).ttl, Some(30));
    }
}
