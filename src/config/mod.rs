pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigError, load_config};
pub use models::{BackendTrust, BufferPoolConfig, RouteConfig, ServerConfig};
pub use validation::{ConfigValidator, ValidationError};
