//! Request forwarding capability consumed by the listener.

pub mod http;

pub use http::{
    SingleHostProxy, append_forwarded_for, join_url_path, strip_hop_by_hop_headers,
};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::net::SocketAddr;

/// Response body produced by handlers; upstream bodies are streamed through as-is
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Handles one decrypted request. Implementations never fail: upstream
/// problems are turned into gateway error responses.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, req: Request<Incoming>, peer: SocketAddr) -> Response<ProxyBody>;
}

/// An empty response body
pub fn empty_body() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}
