/// Prox Relay - a reverse-proxy forwarding engine
///
/// This crate rewrites inbound requests onto a single backend and streams the
/// backend's answer back to the caller:
/// - Plain HTTP or TLS backends, with an explicit leaf-hostname check
/// - Path joining, query merging and Host rewriting per route
/// - Bounded-latency flushing while bodies stream
/// - Pooled copy buffers
// Re-export public modules with explicit visibility controls
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::adapters::{HyperServer, RouteError, build_proxy};
pub use crate::core::{Forwarded, ProxyError, ReverseProxy, Target};
