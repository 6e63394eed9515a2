// Client IP extraction for rate-limit keys.
//
// The socket peer address is the client unless the deployment names proxy
// headers it trusts (`trustedIpHeaders`). Those headers are written by the
// client when nothing sits in front of the server, so they are only read
// when configured.

use std::net::IpAddr;

/// Used when neither a trusted header nor a peer address is available.
pub const UNKNOWN_IP: &str = "unknown";

/// Resolve the client IP.
///
/// `header` looks up a request header by lowercase name. `trusted_headers`
/// are checked in order; for `x-forwarded-for`-style lists only the
/// left-most entry is used. Falls back to `peer`.
pub fn client_ip<F>(header: F, trusted_headers: &[String], peer: Option<IpAddr>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    trusted_headers
        .iter()
        .filter_map(|name| header(&name.to_ascii_lowercase()))
        .find_map(|value| {
            let first = value.split(',').next().unwrap_or("").trim().to_string();
            first.parse::<IpAddr>().ok()
        })
        .or(peer)
        .map(normalize_ip)
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// Canonical text form; IPv4-mapped IPv6 addresses collapse to IPv4 so one
/// client cannot get two buckets.
pub fn normalize_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
    }
}
