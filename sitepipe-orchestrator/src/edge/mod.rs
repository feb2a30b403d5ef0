//! Edge Module
//!
//! HTTP front of the distribution:
//! - Redirects the alias host and plain-HTTP viewers to the https canonical URL
//! - Serves published content through the edge cache
//! - Negotiates gzip with the viewer
//! - Writes one access log line per request

pub mod alias;
pub mod cache;
pub mod content;

use axum::{
    Router,
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use sitepipe_core::domain::binding::DomainBinding;
use sitepipe_core::domain::cache::{CachePolicy, ViewerProtocolPolicy};
use std::sync::Arc;

use crate::repository::Origin;
use alias::Route;
use cache::{EdgeCache, EdgeResponse};

pub const FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_CACHE: &str = "x-cache";

/// Edge node serving one site
pub struct EdgeNode {
    binding: DomainBinding,
    viewer_protocol_policy: ViewerProtocolPolicy,
    cache: EdgeCache,
}

impl EdgeNode {
    pub fn new(
        binding: DomainBinding,
        policy: CachePolicy,
        viewer_protocol_policy: ViewerProtocolPolicy,
        origin: Arc<dyn Origin>,
    ) -> Self {
        Self {
            binding,
            viewer_protocol_policy,
            cache: EdgeCache::new(policy, origin),
        }
    }

    pub fn cache(&self) -> &EdgeCache {
        &self.cache
    }
}

/// Create the edge router; every path is handled by the same fallback
pub fn create_edge_router(node: Arc<EdgeNode>) -> Router {
    Router::new().fallback(serve).with_state(node)
}

async fn serve(
    State(node): State<Arc<EdgeNode>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or("")
        .to_string();
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");
    let path_and_query = uri.path_and_query().map_or("/", |p| p.as_str());

    let (response, outcome) = match alias::route(
        &node.binding,
        node.viewer_protocol_policy,
        &host,
        scheme,
        path_and_query,
    ) {
        Route::Misdirected => (
            (StatusCode::MISDIRECTED_REQUEST, "Unknown host").into_response(),
            "Error",
        ),
        Route::Redirect { location } => (
            redirect(&location, node.cache.policy().default_ttl()),
            "Redirect",
        ),
        Route::Serve if method != Method::GET && method != Method::HEAD => {
            let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            (response, "Error")
        }
        Route::Serve => match node.cache.get(uri.path()).await {
            Ok(cached) => {
                let label = cached.status.header_value();
                (
                    cached_response(cached, accepts_gzip(&headers), method == Method::HEAD),
                    label,
                )
            }
            Err(e) => {
                tracing::error!("Origin fetch for {} failed: {}", uri.path(), e);
                ((StatusCode::BAD_GATEWAY, "Origin unavailable").into_response(), "Error")
            }
        },
    };

    tracing::info!(
        target: "sitepipe::access",
        host = %host,
        method = %method,
        path = uri.path(),
        status = response.status().as_u16(),
        cache = outcome,
        bytes = response.body().size_hint().exact().unwrap_or(0),
        "request"
    );

    response
}

fn redirect(location: &str, max_age: u64) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CACHE_CONTROL, max_age_header(max_age));
    response
}

fn cached_response(cached: EdgeResponse, gzip: bool, head: bool) -> Response {
    let object = cached.object;
    let compressed = object.gzipped.clone().filter(|_| gzip);
    let encoded = compressed.is_some();
    let body = if head {
        Body::empty()
    } else {
        Body::from(compressed.unwrap_or_else(|| object.body.clone()))
    };

    let mut response = body.into_response();
    *response.status_mut() =
        StatusCode::from_u16(object.status).unwrap_or(StatusCode::OK);

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(object.content_type),
    );
    headers.insert(header::CACHE_CONTROL, max_age_header(object.ttl));
    headers.insert(header::AGE, HeaderValue::from(cached.age));
    headers.insert(
        X_CACHE,
        HeaderValue::from_static(cached.status.header_value()),
    );
    if object.gzipped.is_some() {
        headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    }
    if encoded {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    response
}

fn max_age_header(seconds: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("max-age={}", seconds))
        .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|coding| {
            let mut parts = coding.split(';');
            let name = parts.next()?.trim();
            let rejected = parts.any(|p| matches!(p.trim(), "q=0" | "q=0.0" | "q=0.00" | "q=0.000"));
            Some((name, rejected))
        })
        .any(|(name, rejected)| name.eq_ignore_ascii_case("gzip") && !rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryPublishTarget, PublishTarget};
    use axum::http::Request;
    use sitepipe_core::config::SiteConfig;
    use sitepipe_core::domain::binding::Certificate;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn edge(files: &[(&str, &str)]) -> (Router, Arc<InMemoryPublishTarget>) {
        let target = Arc::new(InMemoryPublishTarget::new());
        for (path, body) in files {
            target.put_file(path, body.as_bytes()).await.unwrap();
        }
        let arn = "arn:aws:acm:us-east-1:123456789012:certificate/abc";
        let config = SiteConfig::new("example.com", arn);
        let certificate = Certificate::new(
            arn,
            vec!["example.com".to_string(), "*.example.com".to_string()],
        );
        let binding = DomainBinding::new(&config, &certificate).unwrap();
        let node = EdgeNode::new(
            binding,
            CachePolicy::default(),
            ViewerProtocolPolicy::RedirectToHttps,
            target.clone(),
        );
        (create_edge_router(Arc::new(node)), target)
    }

    fn get(host: &str, proto: &str, path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header(header::HOST, host)
            .header(FORWARDED_PROTO, proto)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_alias_redirects_to_canonical() {
        let (app, _) = edge(&[("index.html", "home")]).await;

        let response = app
            .oneshot(get("www.example.com", "https", "/docs/?page=2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://example.com/docs/?page=2"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=30");
    }

    #[tokio::test]
    async fn test_plain_http_redirects() {
        let (app, _) = edge(&[("index.html", "home")]).await;

        let response = app
            .oneshot(get("example.com", "http", "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "https://example.com/");
    }

    #[tokio::test]
    async fn test_serves_index_with_headers() {
        let (app, _) = edge(&[("index.html", "home")]).await;

        let response = app
            .oneshot(get("example.com", "https", "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(response.headers()[X_CACHE], "Miss from edge");
        assert_eq!(response.headers()[header::AGE], "0");
        assert_eq!(body_text(response).await, "home");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_hits_cache() {
        let (app, target) = edge(&[("index.html", "v1")]).await;

        app.clone()
            .oneshot(get("example.com", "https", "/"))
            .await
            .unwrap();
        target.put_file("index.html", b"v2").await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let response = app
            .oneshot(get("example.com", "https", "/?utm=mail"))
            .await
            .unwrap();
        assert_eq!(response.headers()[X_CACHE], "Hit from edge");
        assert_eq!(response.headers()[header::AGE], "10");
        assert_eq!(body_text(response).await, "v1");
    }

    #[tokio::test]
    async fn test_missing_page_returns_error_document() {
        let (app, _) = edge(&[("index.html", "home"), ("404.html", "not here")]).await;

        let response = app
            .oneshot(get("example.com", "https", "/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "not here");
    }

    #[tokio::test]
    async fn test_gzip_negotiation() {
        let script = "console.log('edge');\n".repeat(100);
        let (app, _) = edge(&[("assets/app.js", script.as_str())]).await;

        let mut request = get("example.com", "https", "/assets/app.js");
        request.headers_mut().insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static("br, gzip;q=0.8"),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(response.headers()[header::VARY], "Accept-Encoding");

        let plain = app
            .oneshot(get("example.com", "https", "/assets/app.js"))
            .await
            .unwrap();
        assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
        assert_eq!(body_text(plain).await, script);
    }

    #[tokio::test]
    async fn test_unknown_host_and_method() {
        let (app, _) = edge(&[("index.html", "home")]).await;

        let response = app
            .clone()
            .oneshot(get("other.org", "https", "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::MISDIRECTED_REQUEST);

        let post = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::HOST, "example.com")
            .header(FORWARDED_PROTO, "https")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_accepts_gzip() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_gzip(&headers));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip;q=0"));
        assert!(!accepts_gzip(&headers));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("deflate, GZIP"));
        assert!(accepts_gzip(&headers));
    }
}
