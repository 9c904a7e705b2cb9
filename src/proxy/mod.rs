// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Proxy Gateway
//!
//! Forwards authenticated requests to internal upstream services, injecting
//! the verified user identity and relaying the upstream response verbatim.
//!
//! ## Security
//!
//! - Targets are a closed enumeration resolved from configuration at
//!   startup; caller input only selects among them
//! - Client-supplied identity-bearing headers are stripped; the gateway is
//!   the sole authority for the `x-gateway-user-id` header
//! - Only an allow-listed subset of request headers is forwarded

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Header carrying the verified internal user id to upstreams.
///
/// Upstreams trust this header implicitly; it must never survive from the
/// incoming request.
pub const USER_ID_HEADER: &str = "x-gateway-user-id";

/// Request headers forwarded to upstreams. Everything else, notably
/// `cookie` and `authorization`, is dropped.
const FORWARDED_HEADERS: &[&str] = &["content-type", "accept"];

/// Closed set of proxyable upstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamService {
    /// AI generation service
    Generation,
    /// Retrieval-augmented generation service
    Rag,
}

impl UpstreamService {
    /// Resolve a path segment to a service. Unknown segments are a routing
    /// miss, never a request to an arbitrary host.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "generation" => Some(Self::Generation),
            "rag" => Some(Self::Rag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Rag => "rag",
        }
    }
}

impl std::fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-service base URLs, validated at startup.
#[derive(Debug, Clone)]
pub struct UpstreamTargets {
    pub generation: String,
    pub rag: String,
}

impl UpstreamTargets {
    fn base_url(&self, service: UpstreamService) -> &str {
        match service {
            UpstreamService::Generation => &self.generation,
            UpstreamService::Rag => &self.rag,
        }
    }
}

/// Proxy failure, distinct from an upstream-reported application error
/// (which is relayed verbatim instead).
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream {0} timed out")]
    UpstreamTimeout(UpstreamService),

    #[error("upstream {0} unavailable: {1}")]
    UpstreamUnavailable(UpstreamService, String),
}

#[derive(Serialize)]
struct ProxyErrorBody {
    error: String,
    error_code: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ProxyError::UpstreamTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
            ProxyError::UpstreamUnavailable(_, _) => {
                (StatusCode::BAD_GATEWAY, "upstream_unavailable")
            }
        };
        tracing::error!(error_code, "proxy failure: {self}");

        let body = Json(ProxyErrorBody {
            error: "Upstream request failed".to_string(),
            error_code: error_code.to_string(),
        });
        (status, body).into_response()
    }
}

/// Forwards authenticated requests to configured upstreams.
pub struct ProxyGateway {
    client: reqwest::Client,
    targets: UpstreamTargets,
    timeout: Duration,
}

impl ProxyGateway {
    pub fn new(targets: UpstreamTargets, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            targets,
            timeout,
        }
    }

    /// Forward a request to an upstream with the verified identity attached.
    ///
    /// The upstream's status and body are relayed verbatim; transport
    /// failures map to [`ProxyError`] so callers can tell them apart from
    /// upstream application errors.
    pub async fn forward(
        &self,
        service: UpstreamService,
        path: &str,
        query: Option<&str>,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        user_id: Uuid,
    ) -> Result<Response, ProxyError> {
        let mut url = format!(
            "{}/{}",
            self.targets.base_url(service).trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }

        let mut request = self.client.request(method, &url).timeout(self.timeout);
        for name in FORWARDED_HEADERS {
            if let Some(value) = headers.get(*name) {
                request = request.header(*name, value);
            }
        }
        // Sole authority for identity on this path.
        request = request.header(USER_ID_HEADER, user_id.to_string());

        tracing::debug!(%service, %url, "forwarding to upstream");

        let upstream = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::UpstreamTimeout(service)
            } else {
                ProxyError::UpstreamUnavailable(service, e.to_string())
            }
        })?;

        let status = upstream.status();
        let mut builder = Response::builder().status(status);
        if let Some(content_type) = upstream.headers().get(header::CONTENT_TYPE) {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| ProxyError::UpstreamUnavailable(service, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// What the stub upstream observed about a request.
    #[derive(Clone)]
    struct SeenRequest {
        headers: HeaderMap,
        uri: String,
    }

    /// Stub upstream that records the incoming request and counts hits.
    async fn spawn_upstream(
        status: StatusCode,
        body: &'static str,
    ) -> (String, Arc<AtomicUsize>, Arc<Mutex<Option<SeenRequest>>>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen_request = Arc::new(Mutex::new(None));

        let hits_clone = hits.clone();
        let seen_clone = seen_request.clone();
        let app = axum::Router::new().route(
            "/{*path}",
            axum::routing::any(move |uri: axum::http::Uri, headers: HeaderMap| {
                let hits = hits_clone.clone();
                let seen = seen_clone.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    *seen.lock().unwrap() = Some(SeenRequest {
                        headers,
                        uri: uri.to_string(),
                    });
                    (
                        status,
                        [(header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), hits, seen_request)
    }

    fn gateway(base: String, timeout: Duration) -> ProxyGateway {
        ProxyGateway::new(
            UpstreamTargets {
                generation: base.clone(),
                rag: base,
            },
            timeout,
        )
    }

    #[test]
    fn path_segment_resolution_is_closed() {
        assert_eq!(
            UpstreamService::from_path_segment("generation"),
            Some(UpstreamService::Generation)
        );
        assert_eq!(
            UpstreamService::from_path_segment("rag"),
            Some(UpstreamService::Rag)
        );
        assert_eq!(UpstreamService::from_path_segment("internal-admin"), None);
        assert_eq!(UpstreamService::from_path_segment(""), None);
    }

    #[tokio::test]
    async fn forward_injects_identity_and_strips_client_headers() {
        let (base, _hits, seen) = spawn_upstream(StatusCode::OK, "{}").await;
        let gateway = gateway(base, Duration::from_secs(5));
        let user_id = Uuid::new_v4();

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        headers.insert(header::COOKIE, "ag_session=stolen".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer stolen".parse().unwrap());
        headers.insert(USER_ID_HEADER, "spoofed-id".parse().unwrap());

        gateway
            .forward(
                UpstreamService::Generation,
                "create-plan",
                None,
                Method::POST,
                &headers,
                Bytes::from_static(b"{}"),
                user_id,
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            seen.headers.get(USER_ID_HEADER).unwrap(),
            user_id.to_string().as_str()
        );
        assert_eq!(
            seen.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(seen.headers.get(header::COOKIE).is_none());
        assert!(seen.headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn forward_preserves_path_and_query() {
        let (base, _hits, seen) = spawn_upstream(StatusCode::OK, "{}").await;
        let gateway = gateway(base, Duration::from_secs(5));

        gateway
            .forward(
                UpstreamService::Rag,
                "search/documents",
                Some("q=hello&limit=5"),
                Method::GET,
                &HeaderMap::new(),
                Bytes::new(),
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.uri, "/search/documents?q=hello&limit=5");
    }

    #[tokio::test]
    async fn upstream_status_and_body_relayed_verbatim() {
        let (base, _hits, _seen) =
            spawn_upstream(StatusCode::IM_A_TEAPOT, r#"{"detail":"no coffee"}"#).await;
        let gateway = gateway(base, Duration::from_secs(5));

        let response = gateway
            .forward(
                UpstreamService::Rag,
                "query",
                None,
                Method::POST,
                &HeaderMap::new(),
                Bytes::new(),
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"detail":"no coffee"}"#);
    }

    #[tokio::test]
    async fn slow_upstream_yields_timeout() {
        let app = axum::Router::new().route(
            "/{*path}",
            axum::routing::any(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let gateway = gateway(format!("http://{addr}"), Duration::from_millis(100));
        let err = gateway
            .forward(
                UpstreamService::Generation,
                "slow",
                None,
                Method::POST,
                &HeaderMap::new(),
                Bytes::new(),
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UpstreamTimeout(_)));
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_unavailable() {
        let gateway = gateway("http://127.0.0.1:1".to_string(), Duration::from_secs(1));
        let err = gateway
            .forward(
                UpstreamService::Generation,
                "anything",
                None,
                Method::POST,
                &HeaderMap::new(),
                Bytes::new(),
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::UpstreamUnavailable(_, _)));
    }

    #[tokio::test]
    async fn proxy_errors_map_to_gateway_statuses() {
        let timeout = ProxyError::UpstreamTimeout(UpstreamService::Rag).into_response();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let unavailable =
            ProxyError::UpstreamUnavailable(UpstreamService::Rag, "refused".into()).into_response();
        assert_eq!(unavailable.status(), StatusCode::BAD_GATEWAY);
    }
}
