use super::{ProxyBody, RequestHandler, empty_body};
use crate::metrics::{Metrics, Timer};
use crate::upstream::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{CONNECTION, HeaderMap, HeaderName, HeaderValue};
use hyper::{Request, Response, StatusCode, Uri};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, error};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers that only apply to a single transport hop
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards every request to one fixed upstream origin
pub struct SingleHostProxy {
    upstream: Uri,
    base_path: String,
    base_query: String,
    client: HttpClient,
    metrics: Metrics,
}

impl SingleHostProxy {
    /// Create a handler for `upstream`, which must be an absolute URL
    pub fn new(upstream: &Uri, client: HttpClient, metrics: Metrics) -> Result<Self> {
        if upstream.scheme().is_none() {
            anyhow::bail!("Upstream {} has no scheme", upstream);
        }
        if upstream.authority().is_none() {
            anyhow::bail!("Upstream {} has no host", upstream);
        }

        Ok(Self {
            upstream: upstream.clone(),
            base_path: upstream.path().to_string(),
            base_query: upstream.query().unwrap_or_default().to_string(),
            client,
            metrics,
        })
    }

    /// Map an inbound request target onto the upstream: scheme and host are
    /// replaced, the upstream path prefixes the request path and both query
    /// strings are kept.
    pub fn rewrite_uri(&self, uri: &Uri) -> Result<Uri> {
        let path = join_url_path(&self.base_path, uri.path());
        let query = uri.query().unwrap_or_default();

        let query = if self.base_query.is_empty() || query.is_empty() {
            format!("{}{}", self.base_query, query)
        } else {
            format!("{}&{}", self.base_query, query)
        };

        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{}?{}", path, query)
        };

        Uri::builder()
            .scheme(self.upstream.scheme_str().unwrap_or("http"))
            .authority(self.upstream.authority().map(|a| a.as_str()).unwrap_or_default())
            .path_and_query(path_and_query)
            .build()
            .with_context(|| format!("Failed to build upstream URI for {}", uri))
    }

    async fn forward(&self, req: Request<Incoming>, peer: SocketAddr) -> Result<Response<ProxyBody>> {
        let (mut parts, body) = req.into_parts();

        let target = self.rewrite_uri(&parts.uri)?;
        debug!("Forwarding {} {} -> {}", parts.method, parts.uri, target);

        parts.uri = target;
        strip_hop_by_hop_headers(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, peer.ip());

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .context("Upstream request failed")?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop_headers(&mut parts.headers);

        Ok(Response::from_parts(parts, body.boxed()))
    }
}

#[async_trait]
impl RequestHandler for SingleHostProxy {
    async fn handle(&self, req: Request<Incoming>, peer: SocketAddr) -> Response<ProxyBody> {
        let timer = Timer::start();
        let method = req.method().clone();
        let uri = req.uri().clone();

        match self.forward(req, peer).await {
            Ok(response) => {
                debug!("{} {} <- {}", method, uri, response.status());
                self.metrics.record_request(true, timer.elapsed());
                response
            }
            Err(e) => {
                error!("Proxy error for {} {} from {}: {:#}", method, uri, peer, e);
                self.metrics.record_upstream_error();
                self.metrics.record_request(false, timer.elapsed());
                bad_gateway()
            }
        }
    }
}

fn bad_gateway() -> Response<ProxyBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::BAD_GATEWAY;
    response
}

/// Join two URL paths with exactly one slash between them
pub fn join_url_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Remove hop-by-hop headers, including any listed in `Connection`
pub fn strip_hop_by_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`, folding any earlier values
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
