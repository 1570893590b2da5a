use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::OnceLock,
};

use actix_web::{http::header::AUTHORIZATION, HttpRequest};
use log::{debug, trace};
use regex::Regex;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The first entry of the `X-Forwarded-For` header, iif `use_x_forwarded_for` is set.
/// 2. The `for=` field of the `Forwarded` header, iif `use_forwarded` is set.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(parse_ip);
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.as_deref().and_then(parse_ip)
    })
}

/// Extracts the address from a `Forwarded` header value, e.g. `for="[2001:db8::1]:4711";proto=https`.
pub fn forwarded_for(header: &str) -> Option<IpAddr> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"(?i)for="?(?P<ip>[^;,"]+)"?"#).unwrap());
    re.captures(header).and_then(|caps| caps.name("ip")).and_then(|m| parse_ip(m.as_str()))
}

/// Accepts bare addresses as well as `ip:port` and `[ipv6]:port` forms.
fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    IpAddr::from_str(s)
        .ok()
        .or_else(|| SocketAddr::from_str(s).ok().map(|a| a.ip()))
        .or_else(|| IpAddr::from_str(s.trim_start_matches('[').trim_end_matches(']')).ok())
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string()).filter(|t| !t.is_empty())
}

/// Compares a presented key with the configured one in constant time. Both are hashed first so that the comparison
/// does not leak the key length either.
pub fn keys_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented.ct_eq(&expected).into()
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn forwarded_headers() {
        assert_eq!(forwarded_for("for=192.0.2.60;proto=http;by=203.0.113.43"), "192.0.2.60".parse().ok());
        assert_eq!(forwarded_for(r#"For="[2001:db8:cafe::17]:4711""#), "2001:db8:cafe::17".parse().ok());
        assert_eq!(forwarded_for("proto=https"), None);
    }

    #[test]
    fn remote_ip_prefers_configured_headers() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "52.31.139.75, 10.0.0.1"))
            .peer_addr("10.0.0.2:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(get_remote_ip(&req, true, false), "52.31.139.75".parse().ok());
        assert_eq!(get_remote_ip(&req, false, false), "10.0.0.2".parse().ok());
    }

    #[test]
    fn bearer_tokens() {
        let req = TestRequest::default().insert_header(("Authorization", "Bearer s3cret")).to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("s3cret"));
        let req = TestRequest::default().insert_header(("Authorization", "Basic s3cret")).to_http_request();
        assert_eq!(bearer_token(&req), None);
        assert_eq!(bearer_token(&TestRequest::default().to_http_request()), None);
    }

    #[test]
    fn api_keys() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cre", "s3cret"));
        assert!(!keys_match("s3cret ", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }
}
