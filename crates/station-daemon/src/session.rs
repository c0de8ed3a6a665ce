use std::net::SocketAddr;

use axum::http::{header, HeaderMap};
use rand::Rng;

pub const TOKEN_COOKIE: &str = "listener_token";
const TOKEN_LEN: usize = 32;

/// Best available network identity for presence dedup.
///
/// Forwarding headers are only honoured when the daemon is known to sit
/// behind a proxy; otherwise any client could inflate the count by setting
/// them.
pub fn client_identity(headers: &HeaderMap, peer: SocketAddr, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.ip().to_string()
}

/// Listener token from the request cookie, or a freshly minted one.
/// The flag is true when the token is new and must be set on the response.
pub fn listener_token(headers: &HeaderMap) -> (String, bool) {
    let existing = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| cookie.trim().strip_prefix("listener_token="))
        .filter(|token| is_valid_token(token));

    match existing {
        Some(token) => (token.to_string(), false),
        None => (mint_token(), true),
    }
}

pub fn token_cookie(token: &str) -> String {
    format!("{}={}; Path=/; SameSite=Strict; HttpOnly", TOKEN_COOKIE, token)
}

fn mint_token() -> String {
    let bytes: [u8; TOKEN_LEN / 2] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.7:51234".parse().unwrap()
    }

    #[test]
    fn test_identity_defaults_to_peer_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(client_identity(&headers, peer(), false), "192.0.2.7");
    }

    #[test]
    fn test_identity_from_trusted_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_identity(&headers, peer(), true), "203.0.113.9");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static(" 198.51.100.4 "));
        assert_eq!(client_identity(&headers, peer(), true), "198.51.100.4");

        assert_eq!(client_identity(&HeaderMap::new(), peer(), true), "192.0.2.7");
    }

    #[test]
    fn test_existing_token_is_echoed() {
        let token = "0123456789abcdef0123456789abcdef";
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; listener_token={}", token)).unwrap(),
        );
        assert_eq!(listener_token(&headers), (token.to_string(), false));
    }

    #[test]
    fn test_malformed_token_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("listener_token=../../etc"));
        let (token, fresh) = listener_token(&headers);
        assert!(fresh);
        assert!(is_valid_token(&token));
    }

    #[test]
    fn test_minted_tokens_differ() {
        let (a, _) = listener_token(&HeaderMap::new());
        let (b, _) = listener_token(&HeaderMap::new());
        assert_ne!(a, b);
        assert!(token_cookie(&a).starts_with("listener_token="));
        assert!(token_cookie(&a).contains("HttpOnly"));
    }
}
