//! Request metadata extraction.
//!
//! # Responsibilities
//! - Derive the client address honoring the reverse-proxy trust setting
//! - Name the request id header shared by the id and trace layers
//!
//! # Design Decisions
//! - Only the configured number of proxy hops is trusted; anything a client
//!   prepends to `X-Forwarded-For` beyond that is ignored
//! - Falls back to the socket peer when no forwarded chain is present

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, Request},
};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client address.
///
/// The address chain is the socket peer followed by the `X-Forwarded-For`
/// entries from right to left. The first `trusted_hops` entries are proxies we
/// trust; the next one is the client. When the chain is shorter, the furthest
/// address wins.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trusted_hops: usize) -> Option<IpAddr> {
    let forwarded: Vec<IpAddr> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    peer.into_iter()
        .chain(forwarded.into_iter().rev())
        .take(trusted_hops + 1)
        .last()
}

/// Client identity used as the rate limiting key.
pub fn client_identity<B>(req: &Request<B>, trusted_hops: usize) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());

    client_ip(req.headers(), peer, trusted_hops)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn headers(xff: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, xff.parse().unwrap());
        headers
    }

    #[test]
    fn no_trust_uses_socket_peer() {
        let found = client_ip(&headers("203.0.113.9"), Some(ip("10.0.0.2")), 0);
        assert_eq!(found, Some(ip("10.0.0.2")));
    }

    #[test]
    fn one_hop_uses_rightmost_forwarded_entry() {
        let found = client_ip(
            &headers("198.51.100.1, 203.0.113.9"),
            Some(ip("10.0.0.2")),
            1,
        );
        assert_eq!(found, Some(ip("203.0.113.9")));
    }

    #[test]
    fn spoofed_prefix_is_ignored() {
        // A client cannot pick its identity by prepending entries.
        let a = client_ip(&headers("1.1.1.1, 203.0.113.9"), Some(ip("10.0.0.2")), 1);
        let b = client_ip(&headers("2.2.2.2, 203.0.113.9"), Some(ip("10.0.0.2")), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn short_chain_falls_back_to_furthest_address() {
        let found = client_ip(&HeaderMap::new(), Some(ip("10.0.0.2")), 3);
        assert_eq!(found, Some(ip("10.0.0.2")));
    }

    #[test]
    fn handles_ipv6_and_garbage() {
        let found = client_ip(&headers("not-an-ip, 2001:db8::1"), None, 1);
        assert_eq!(found, Some(ip("2001:db8::1")));
        assert_eq!(client_ip(&headers("not-an-ip"), None, 1), None);
    }

    #[test]
    fn identity_without_any_address_is_unknown() {
        let req = Request::builder().body(()).unwrap();
        assert_eq!(client_identity(&req, 1), "unknown");
    }
}
