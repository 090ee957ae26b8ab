//! Request handling and transformation.
//!
//! # Responsibilities
//! - Buffer the inbound body so every candidate can replay it
//! - Strip hop-by-hop headers before forwarding
//! - Record the client address in `x-forwarded-for`
//!
//! # Design Decisions
//! - Body size limit enforced while buffering; oversize requests get 413
//! - Request ID is assigned by tower-http before this runs

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;

/// Correlation header assigned to every request.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Connection-scoped headers never forwarded across the proxy (RFC 9110 §7.6.1).
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
}

/// Why an inbound request could not be prepared.
#[derive(Debug)]
pub enum RequestRejection {
    BodyTooLarge { limit: usize },
    BodyRead(String),
}

impl IntoResponse for RequestRejection {
    fn into_response(self) -> Response {
        match self {
            RequestRejection::BodyTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds {} bytes", limit),
            )
                .into_response(),
            RequestRejection::BodyRead(_) => {
                (StatusCode::BAD_REQUEST, "Failed to read request body").into_response()
            }
        }
    }
}

impl RequestRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestRejection::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RequestRejection::BodyRead(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Buffer the body and clean the head for forwarding.
pub async fn prepare(
    request: Request<Body>,
    client: Option<SocketAddr>,
    limit: usize,
) -> Result<Request<Bytes>, RequestRejection> {
    let (mut parts, body) = request.into_parts();

    let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
        let too_large = std::error::Error::source(&e)
            .is_some_and(|source| source.is::<LengthLimitError>());
        if too_large {
            RequestRejection::BodyTooLarge { limit }
        } else {
            RequestRejection::BodyRead(e.to_string())
        }
    })?;

    strip_hop_by_hop(&mut parts.headers);

    if let Some(client) = client {
        let forwarded = match parts.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, client.ip()),
            None => client.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            parts.headers.insert(X_FORWARDED_FOR, value);
        }
    }

    Ok(Request::from_parts(parts, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::ACCEPT], "*/*");
    }

    #[tokio::test]
    async fn test_prepare_buffers_and_forwards_client() {
        let request = Request::post("/orders")
            .header("x-forwarded-for", "198.51.100.7")
            .header(header::CONNECTION, "close")
            .body(Body::from("payload"))
            .unwrap();
        let client: SocketAddr = "203.0.113.9:5000".parse().unwrap();

        let prepared = prepare(request, Some(client), 1024).await.unwrap();
        assert_eq!(prepared.body().as_ref(), b"payload");
        assert_eq!(prepared.headers()["x-forwarded-for"], "198.51.100.7, 203.0.113.9");
        assert!(!prepared.headers().contains_key(header::CONNECTION));
    }

    #[tokio::test]
    async fn test_prepare_rejects_oversize_body() {
        let request = Request::post("/upload")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();

        let rejection = prepare(request, None, 16).await.unwrap_err();
        assert!(matches!(rejection, RequestRejection::BodyTooLarge { limit: 16 }));
        assert_eq!(rejection.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
