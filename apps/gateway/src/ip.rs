//! Client IP resolution for rate limiting and audit logging.

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use axum_helpers::audit::extract_ip_from_headers;
use std::net::SocketAddr;

/// Resolve the client IP: `X-Forwarded-For` first element,
/// else `X-Real-IP`, else `CF-Connecting-IP`, else the peer address.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> String {
    extract_ip_from_headers(headers)
        .or_else(|| {
            headers
                .get("cf-connecting-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_x_forwarded_for_first_element() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(resolve_client_ip(&headers, None), "1.2.3.4");
    }

    #[test]
    fn falls_back_to_cf_connecting_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("4.4.4.4"));
        assert_eq!(resolve_client_ip(&headers, None), "4.4.4.4");
    }

    #[test]
    fn falls_back_to_peer_when_no_headers_present() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        assert_eq!(resolve_client_ip(&headers, Some(ConnectInfo(peer))), "127.0.0.1");
    }
}
