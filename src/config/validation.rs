use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::models::{BufferPoolConfig, RouteConfig, ServerConfig};
use crate::core::Target;

/// Flush intervals above this are almost certainly a unit mistake.
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid URL in field '{field}': {url} - {reason}")]
    InvalidUrl {
        field: String,
        url: String,
        reason: String,
    },

    #[error("Invalid listen address: {address} - {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid buffer pool configuration: {message}")]
    InvalidBufferPool { message: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validator with detailed error reporting
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Some(metrics_addr) = &config.metrics_addr {
            if let Err(e) = Self::validate_listen_address(metrics_addr) {
                errors.push(e);
            }
            if metrics_addr == &config.listen_addr {
                errors.push(ValidationError::InvalidField {
                    field: "metrics_addr".to_string(),
                    message: "Must differ from listen_addr".to_string(),
                });
            }
        }

        if let Err(route_errors) = Self::validate_route(&config.route) {
            errors.extend(route_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_route(config: &RouteConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_target(&config.target) {
            errors.push(e);
        }

        if config.flush_interval > MAX_FLUSH_INTERVAL {
            errors.push(ValidationError::InvalidField {
                field: "route.flush_interval".to_string(),
                message: format!(
                    "{} exceeds the maximum of {}",
                    humantime::format_duration(config.flush_interval),
                    humantime::format_duration(MAX_FLUSH_INTERVAL)
                ),
            });
        }

        if let Some(pool) = &config.buffer_pool {
            if let Err(e) = Self::validate_buffer_pool(pool) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The target must be an absolute http(s) URL with a host
    fn validate_target(target: &str) -> ValidationResult<()> {
        let parsed = Target::parse(target).map_err(|e| ValidationError::InvalidUrl {
            field: "route.target".to_string(),
            url: target.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme().as_str() {
            "http" | "https" => Ok(()),
            other => Err(ValidationError::InvalidUrl {
                field: "route.target".to_string(),
                url: target.to_string(),
                reason: format!("Unsupported scheme '{}', expected http or https", other),
            }),
        }
    }

    fn validate_buffer_pool(config: &BufferPoolConfig) -> ValidationResult<()> {
        if config.buffers == 0 {
            return Err(ValidationError::InvalidBufferPool {
                message: "buffers must be greater than 0".to_string(),
            });
        }
        if config.buffer_size == 0 {
            return Err(ValidationError::InvalidBufferPool {
                message: "buffer_size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let mut message = format!("Found {} validation error(s):\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
