use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::DEFAULT_BUFFER_SIZE;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    #[serde(default)]
    pub metrics_addr: Option<String>,
    pub route: RouteConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    metrics_addr: Option<String>,
    route: Option<RouteConfig>,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Expose Prometheus metrics on this address
    pub fn metrics_addr(mut self, addr: impl Into<String>) -> Self {
        self.metrics_addr = Some(addr.into());
        self
    }

    /// Set the route this listener forwards to
    pub fn route(mut self, route: RouteConfig) -> Self {
        self.route = Some(route);
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> Result<ServerConfig, String> {
        let listen_addr = self.listen_addr.ok_or_else(|| "listen_addr is required".to_string())?;
        let route = self.route.ok_or_else(|| "A route must be configured".to_string())?;

        Ok(ServerConfig {
            listen_addr,
            metrics_addr: self.metrics_addr,
            route,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub target: String,
    /// Upper bound on how long streamed bytes may wait before being flushed; zero disables.
    #[serde(default, with = "duration_str")]
    pub flush_interval: Duration,
    #[serde(default)]
    pub backend_trust: BackendTrust,
    #[serde(default)]
    pub buffer_pool: Option<BufferPoolConfig>,
}

impl RouteConfig {
    /// Create a proxy route to a single backend
    pub fn proxy(target: impl Into<String>) -> Self {
        RouteConfig {
            target: target.into(),
            flush_interval: Duration::ZERO,
            backend_trust: BackendTrust::default(),
            buffer_pool: None,
        }
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn backend_trust(mut self, trust: BackendTrust) -> Self {
        self.backend_trust = trust;
        self
    }

    pub fn buffer_pool(mut self, pool: BufferPoolConfig) -> Self {
        self.buffer_pool = Some(pool);
        self
    }
}

/// How a TLS backend's certificate is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendTrust {
    /// Skip chain verification; only the leaf certificate's hostname is checked.
    #[default]
    #[serde(rename = "leaf_hostname")]
    LeafHostname,
    /// Verify the chain against the platform trust store, then the hostname.
    #[serde(rename = "native_roots")]
    NativeRoots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    pub buffers: usize,
    pub buffer_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            buffers: 64,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_route() {
        let yaml = r#"
listen_addr: "127.0.0.1:8080"
metrics_addr: "127.0.0.1:9100"
route:
  target: "https://backend.internal:8443/api?tenant=a"
  flush_interval: "100ms"
  backend_trust: native_roots
  buffer_pool:
    buffers: 8
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.metrics_addr.as_deref(), Some("127.0.0.1:9100"));
        assert_eq!(config.route.flush_interval, Duration::from_millis(100));
        assert_eq!(config.route.backend_trust, BackendTrust::NativeRoots);
        let pool = config.route.buffer_pool.unwrap();
        assert_eq!(pool.buffers, 8);
        assert_eq!(pool.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_route_defaults() {
        let yaml = r#"
listen_addr: "0.0.0.0:80"
route:
  target: "http://backend:9000"
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();

        assert!(config.metrics_addr.is_none());
        assert_eq!(config.route.flush_interval, Duration::ZERO);
        assert_eq!(config.route.backend_trust, BackendTrust::LeafHostname);
        assert!(config.route.buffer_pool.is_none());
    }

    #[test]
    fn test_rejects_unparseable_interval() {
        let yaml = r#"
listen_addr: "0.0.0.0:80"
route:
  target: "http://backend:9000"
  flush_interval: "soon"
"#;
        assert!(serde_yaml::from_str::<ServerConfig>(yaml).is_err());
    }

    #[test]
    fn test_builder_requires_route() {
        let err = ServerConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .build()
            .unwrap_err();
        assert!(err.contains("route"));
    }
}
