//! Client identity extraction for the request-dispatch layer.

use std::net::SocketAddr;

/// Derives a rate-limiting key from a peer address by dropping its port.
///
/// - `192.168.1.7:52100` → `192.168.1.7`
/// - `[2001:db8::1]:443` → `2001:db8::1`
/// - `2001:db8::1` (no port) → unchanged
/// - anything else without a single `:` suffix → unchanged
///
/// ```rust
/// use tollbooth::client_identity;
///
/// assert_eq!(client_identity("10.0.0.1:8080"), "10.0.0.1");
/// assert_eq!(client_identity("[::1]:3000"), "::1");
/// assert_eq!(client_identity("::1"), "::1");
/// assert_eq!(client_identity("gateway.internal:9000"), "gateway.internal");
/// ```
pub fn client_identity(peer: &str) -> String {
    if let Ok(addr) = peer.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }

    // Not a socket address: strip a `host:port` suffix, but leave bare IPv6
    // literals (several colons) alone.
    match peer.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':')
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host.to_string()
        }
        _ => peer.trim_start_matches('[').trim_end_matches(']').to_string(),
    }
}
