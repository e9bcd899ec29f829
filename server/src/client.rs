//! Client address resolution for blocklist checks.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Determine the address a visit came from.
///
/// With `trust_forwarded_for`, `X-Forwarded-For` is read from the right:
/// entries equal to the connection peer (the proxy) are skipped and the
/// first other address wins. An unparsable entry ends the walk, since
/// anything left of it was supplied by the client. `X-Real-IP` is only
/// consulted when `X-Forwarded-For` is absent. Otherwise the peer address
/// of the connection is used. Returns `None` when the router was mounted
/// without connection info and no trusted header is present.
pub fn client_addr(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| peer.ip().to_canonical());

    let forwarded = trust_forwarded_for
        .then(|| forwarded_addr(request.headers(), peer))
        .flatten();

    forwarded.or(peer)
}

fn forwarded_addr(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let header_str = |name: &'static str| headers.get(name).and_then(|v| v.to_str().ok());

    let Some(list) = header_str(X_FORWARDED_FOR) else {
        return header_str(X_REAL_IP)
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
            .map(|addr| addr.to_canonical());
    };

    for entry in list.rsplit(',') {
        let addr = entry.trim().parse::<IpAddr>().ok()?.to_canonical();
        if Some(addr) != peer {
            return Some(addr);
        }
    }
    None
}
