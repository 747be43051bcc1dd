use std::sync::Arc;

use thiserror::Error;

use crate::adapters::buffer_pool::SharedBufferPool;
use crate::adapters::transport::select_transport;
use crate::config::RouteConfig;
use crate::core::{ReverseProxy, Target, TargetError};
use crate::ports::TransportError;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid route target: {0}")]
    Target(#[from] TargetError),

    #[error("Failed to prepare backend transport: {0}")]
    Transport(#[from] TransportError),
}

/// Assemble the forwarding engine for one configured route.
///
/// The transport is chosen once here from the target's scheme and shared by
/// every exchange on the route.
pub fn build_proxy(config: &RouteConfig) -> Result<ReverseProxy, RouteError> {
    let target = Target::parse(&config.target)?;
    let transport = select_transport(&target, config.backend_trust)?;

    let mut builder = ReverseProxy::builder(target, transport).flush_interval(config.flush_interval);
    if let Some(pool) = &config.buffer_pool {
        builder = builder.buffer_pool(Arc::new(SharedBufferPool::new(pool.buffers, pool.buffer_size)));
    }

    let proxy = builder.build();
    tracing::info!(
        "Route ready: {} (flush interval {}, pooled buffers: {})",
        proxy.target(),
        humantime::format_duration(proxy.flush_interval()),
        config.buffer_pool.is_some()
    );
    Ok(proxy)
}
