pub mod http;

pub use http::{HttpClient, create_http_client};
