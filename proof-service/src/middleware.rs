//! Client IP resolution for per-client rate limiting

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Client IP and where it came from. Priority: CF-Connecting-IP, then the
/// first X-Forwarded-For entry, then the socket peer.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Option<(String, &'static str)> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    header_value(CF_CONNECTING_IP)
        .map(|ip| (ip, "cf-connecting-ip"))
        .or_else(|| header_value(X_FORWARDED_FOR).map(|ip| (ip, "x-forwarded-for")))
        .or_else(|| peer.map(|addr| (addr.ip().to_string(), "socket")))
}

/// Rewrite X-Forwarded-For to the resolved client IP so the limiter keys on it.
pub async fn inject_client_ip(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    match resolve_client_ip(req.headers(), peer) {
        Some((ip, source)) => {
            debug!("client_ip_source={} ip={}", source, ip);
            if let Ok(value) = HeaderValue::from_str(&ip) {
                req.headers_mut()
                    .insert(HeaderName::from_static(X_FORWARDED_FOR), value);
            }
        }
        None => debug!("client_ip_source=unavailable"),
    }

    next.run(req).await
}
