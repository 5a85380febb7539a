use crate::error::ProxyError;
use crate::tls_utils;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

/// Shared client for upstream requests; speaks plain http and https and
/// streams the inbound request body through unchanged
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Incoming>;

/// Create the upstream client
pub fn create_http_client() -> Result<HttpClient, ProxyError> {
    let tls_config = tls_utils::create_client_config()?;

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build();

    Ok(Client::builder(TokioExecutor::new()).build(connector))
}
