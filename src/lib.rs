pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod server;
pub mod tls_utils;
pub mod upstream;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ConfigInput, ConfigMap, EffectiveConfig};
pub use error::{AppError, ParseError};
pub use server::{LifecycleState, ProxyServer, ShutdownHandle};
