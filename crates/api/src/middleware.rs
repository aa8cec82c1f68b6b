use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use ipnet::IpNet;

use lessonbay_auth::IdentityResolver;
use lessonbay_infra::FixedWindowLimiter;

use crate::app::errors::json_error;
use crate::authz::auth_error_to_response;
use crate::context::{MaybePrincipal, PrincipalContext};

#[derive(Clone)]
pub struct AuthState {
    pub resolver: Arc<IdentityResolver>,
}

/// Require a resolvable, non-suspended caller.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers());

    let principal = state
        .resolver
        .resolve(token, Utc::now())
        .await
        .map_err(auth_error_to_response)?;

    req.extensions_mut().insert(PrincipalContext::new(principal));
    Ok(next.run(req).await)
}

/// Resolve the caller when a credential is present; guests pass through.
///
/// A credential that is present but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let caller = match extract_bearer(req.headers()) {
        None => MaybePrincipal(None),
        Some(token) => {
            let principal = state
                .resolver
                .resolve(Some(token), Utc::now())
                .await
                .map_err(auth_error_to_response)?;
            MaybePrincipal(Some(PrincipalContext::new(principal)))
        }
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Proxies whose `X-Forwarded-For` hops are believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<[IpNet]>);

impl TrustedProxies {
    pub fn new(nets: impl IntoIterator<Item = IpNet>) -> Self {
        Self(nets.into_iter().collect())
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.iter().any(|net| net.contains(&ip))
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<FixedWindowLimiter>,
    pub trusted_proxies: TrustedProxies,
}

/// Count the request against the state's limiter, keyed by source address.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let key = client_key(&req, &state.trusted_proxies);
    if !state.limiter.allow(&key, Utc::now()) {
        return Err(json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "too many requests, try again later",
        ));
    }
    Ok(next.run(req).await)
}

/// The TCP peer, unless it is a trusted proxy, in which case the forwarded client.
///
/// Without a peer address every request shares one bucket.
fn client_key<B>(req: &Request<B>, trusted: &TrustedProxies) -> String {
    let Some(peer) = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    else {
        return "unknown".to_string();
    };

    if !trusted.contains(peer) {
        return peer.to_string();
    }
    forwarded_client(req.headers(), trusted).unwrap_or(peer).to_string()
}

/// Right-most `X-Forwarded-For` hop that is not a trusted proxy.
///
/// Hops left of it were written by the client and are ignored. A malformed hop ends
/// the walk.
fn forwarded_client(headers: &HeaderMap, trusted: &TrustedProxies) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    for hop in hops.into_iter().rev() {
        let ip = hop.parse::<IpAddr>().ok()?;
        if !trusted.contains(ip) {
            return Some(ip);
        }
    }
    None
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
