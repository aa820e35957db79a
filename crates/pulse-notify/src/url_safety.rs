//! Webhook URL validation: scheme enforcement and private/loopback/
//! link-local/cloud-metadata address blocking (`spec.md` §4.5's "URL
//! safety"). Run at channel creation AND before every request.

use std::net::IpAddr;

use reqwest::Url;

/// Why a webhook URL was rejected. Always a permanent error — retrying
/// an SSRF-unsafe URL can never become safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSafetyError {
    InvalidUrl,
    DisallowedScheme(String),
    UnsafeAddress(IpAddr),
    UnresolvedHost,
}

impl std::fmt::Display for UrlSafetyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlSafetyError::InvalidUrl => write!(f, "invalid webhook url"),
            UrlSafetyError::DisallowedScheme(scheme) => write!(f, "disallowed scheme: {scheme}"),
            UrlSafetyError::UnsafeAddress(addr) => write!(f, "unsafe address: {addr}"),
            UrlSafetyError::UnresolvedHost => write!(f, "webhook host did not resolve"),
        }
    }
}

/// Validate the scheme and hostname grammar only — no DNS resolution.
/// Used at channel-creation time, where a resolver round-trip would be
/// wasteful and the hostname may not yet be reachable.
pub fn validate_url_shape(url: &str, allow_http: bool) -> Result<Url, UrlSafetyError> {
    let parsed = Url::parse(url).map_err(|_| UrlSafetyError::InvalidUrl)?;

    match parsed.scheme() {
        "https" => {}
        "http" if allow_http => {}
        other => return Err(UrlSafetyError::DisallowedScheme(other.to_string())),
    }

    if parsed.host_str().is_none() {
        return Err(UrlSafetyError::InvalidUrl);
    }

    Ok(parsed)
}

/// Whether an already-resolved IP address is safe to connect to: not
/// private, loopback, link-local, multicast, unspecified, or a cloud
/// metadata address.
pub fn is_unsafe_address(addr: IpAddr) -> bool {
    if addr == IpAddr::V4(std::net::Ipv4Addr::new(169, 254, 169, 254)) {
        return true;
    }

    match addr {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_multicast() || v4.is_unspecified() || v4.is_broadcast()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_multicast() || v6.is_unspecified() || v6.is_unique_local() || v6.is_unicast_link_local(),
    }
}

/// Resolve `host:port` and reject if any resolved address is unsafe.
/// Called immediately before every outbound request so a DNS-rebinding
/// attack between validation and send is still caught
/// (`spec.md` §8 scenario 6).
pub async fn validate_resolves_safely(url: &Url, allow_http: bool) -> Result<(), UrlSafetyError> {
    validate_url_shape(url.as_str(), allow_http)?;

    let host = url.host_str().ok_or(UrlSafetyError::InvalidUrl)?;
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| UrlSafetyError::UnresolvedHost)?
        .collect::<Vec<_>>();

    if addrs.is_empty() {
        return Err(UrlSafetyError::UnresolvedHost);
    }

    for addr in addrs {
        if is_unsafe_address(addr.ip()) {
            return Err(UrlSafetyError::UnsafeAddress(addr.ip()));
        }
    }

    Ok(())
}
