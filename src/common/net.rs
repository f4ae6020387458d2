//! Address helpers
//!
//! Listen and target addresses stay strings until bind or dial time, so
//! these helpers inspect `host:port` text without resolving names.

use std::net::{IpAddr, Ipv4Addr};

use super::error::{ProxyError, Result};

/// Split `host:port` into its parts without resolving the host
///
/// IPv6 hosts must be bracketed (`[::1]:9000`); the brackets are stripped.
pub fn split_host_port(addr: &str) -> Result<(&str, u16)> {
    let invalid = |reason: &str| ProxyError::Config(format!("Invalid address '{}': {}", addr, reason));

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| invalid("unterminated '['"))?,
        None if host.contains(':') => return Err(invalid("IPv6 hosts must be bracketed")),
        None => host,
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    let port = port.parse::<u16>().map_err(|_| invalid("port must be 0-65535"))?;
    Ok((host, port))
}

/// Literal IP of a host; `localhost` counts as the IPv4 loopback
fn host_ip(host: &str) -> Option<IpAddr> {
    if host.eq_ignore_ascii_case("localhost") {
        return Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    host.parse().ok()
}

/// Whether two `host:port` addresses would land on the same local socket
///
/// Port 0 never overlaps. A wildcard host (`0.0.0.0`, `::`) overlaps any IP
/// on the same port. Host names other than `localhost` only match themselves.
pub fn endpoints_overlap(a: &str, b: &str) -> bool {
    let (Ok((host_a, port_a)), Ok((host_b, port_b))) = (split_host_port(a), split_host_port(b)) else {
        return false;
    };
    if port_a != port_b || port_a == 0 {
        return false;
    }
    if host_a.eq_ignore_ascii_case(host_b) {
        return true;
    }

    match (host_ip(host_a), host_ip(host_b)) {
        (Some(ip_a), Some(ip_b)) => ip_a == ip_b || ip_a.is_unspecified() || ip_b.is_unspecified(),
        _ => false,
    }
}
