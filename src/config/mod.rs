//! Configuration module

pub mod cli;
pub mod redis_config;
pub mod tls_config;

pub use cli::{CliArgs, Command};
pub use redis_config::{AuthConfig, RedisConfig, RedisType, ServiceRewrite};
pub use tls_config::TlsConfig;
