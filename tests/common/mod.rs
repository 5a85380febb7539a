#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Self-signed certificate and key for `localhost`, written as PEM files
pub struct TestCert {
    pub dir: TempDir,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

pub fn generate_cert() -> TestCert {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    let dir = TempDir::new().unwrap();
    let cert_file = dir.path().join("cert.pem");
    let key_file = dir.path().join("key.pem");
    std::fs::write(&cert_file, cert.serialize_pem().unwrap()).unwrap();
    std::fs::write(&key_file, cert.serialize_private_key_pem()).unwrap();

    TestCert {
        dir,
        cert_file,
        key_file,
    }
}

/// Plain http upstream that echoes request details back as text.
///
/// Requests to `/slow` signal `entered` and then wait `delay` before answering.
pub struct TestUpstream {
    pub addr: SocketAddr,
    pub entered: Arc<Notify>,
}

pub async fn spawn_upstream(delay: Duration) -> TestUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let entered = Arc::new(Notify::new());

    let notify = Arc::clone(&entered);
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let notify = Arc::clone(&notify);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let notify = Arc::clone(&notify);
                    async move { Ok::<_, Infallible>(echo(req, notify, delay).await) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    TestUpstream { addr, entered }
}

async fn echo(req: Request<Incoming>, entered: Arc<Notify>, delay: Duration) -> Response<Full<Bytes>> {
    if req.uri().path() == "/slow" {
        entered.notify_one();
        tokio::time::sleep(delay).await;
    }

    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    let summary = format!(
        "{} {} xff={} conn={}",
        req.method(),
        req.uri(),
        header("x-forwarded-for"),
        header("x-hop"),
    );

    let body = req.into_body().collect().await.unwrap().to_bytes();
    let mut text = summary.into_bytes();
    if !body.is_empty() {
        text.extend_from_slice(b" body=");
        text.extend_from_slice(&body);
    }

    Response::builder()
        .header("x-upstream", "echo")
        .body(Full::new(Bytes::from(text)))
        .unwrap()
}

/// TLS client that trusts anything; connections are not pooled
pub fn https_client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
