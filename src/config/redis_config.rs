//! Connection configuration

use std::fmt;
use std::time::Duration;

use super::tls_config::TlsConfig;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Deployment kind a client speaks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisType {
    Standalone,
    Cluster,
}

impl fmt::Display for RedisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedisType::Standalone => write!(f, "standalone"),
            RedisType::Cluster => write!(f, "cluster"),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub password: String,
    pub username: Option<String>,
}

/// Rewrites the hostname a node reports about itself into one reachable by callers
///
/// Only the left-most occurrence of `internal` is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRewrite {
    pub internal: String,
    pub external: String,
}

impl ServiceRewrite {
    pub fn new(internal: impl Into<String>, external: impl Into<String>) -> Self {
        Self {
            internal: internal.into(),
            external: external.into(),
        }
    }

    pub fn apply(&self, address: &str) -> String {
        address.replacen(&self.internal, &self.external, 1)
    }
}

/// Configuration for a single connection
///
/// Without `read_timeout_ms` / `write_timeout_ms` a stuck peer blocks the
/// caller holding the connection for as long as the socket stays open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// `host:port` entries; the first one is dialed
    pub addresses: Vec<String>,
    pub auth: Option<AuthConfig>,
    pub tls: Option<TlsConfig>,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub external_service: Option<String>,
    pub internal_service: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            auth: None,
            tls: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: None,
            write_timeout_ms: None,
            external_service: None,
            internal_service: None,
        }
    }
}

impl RedisConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            addresses: vec![address.into()],
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig {
            password: password.into(),
            username: None,
        });
        self
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig {
            password: password.into(),
            username: Some(username.into()),
        });
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Apply one deadline to both socket reads and writes
    pub fn with_io_timeout(mut self, timeout_ms: u64) -> Self {
        self.read_timeout_ms = Some(timeout_ms);
        self.write_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_service_rewrite(
        mut self,
        internal: impl Into<String>,
        external: impl Into<String>,
    ) -> Self {
        self.internal_service = Some(internal.into());
        self.external_service = Some(external.into());
        self
    }

    /// Address that gets dialed
    pub fn address(&self) -> Option<&str> {
        self.addresses.first().map(String::as_str)
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Password is required for AUTH; a username alone is ignored
    pub fn credentials(&self) -> Option<(&str, Option<&str>)> {
        self.auth
            .as_ref()
            .filter(|a| !a.password.is_empty())
            .map(|a| (a.password.as_str(), a.username.as_deref().filter(|u| !u.is_empty())))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Rewrite rule, present only when both service names are configured
    pub fn service_rewrite(&self) -> Option<ServiceRewrite> {
        match (&self.internal_service, &self.external_service) {
            (Some(internal), Some(external)) => Some(ServiceRewrite::new(internal, external)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RedisConfig::new("127.0.0.1:6379");
        assert_eq!(cfg.address(), Some("127.0.0.1:6379"));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert!(cfg.read_timeout().is_none());
        assert!(cfg.credentials().is_none());
        assert!(!cfg.tls_enabled());
        assert!(RedisConfig::default().address().is_none());
    }

    #[test]
    fn test_credentials_forms() {
        let cfg = RedisConfig::new("a:1").with_password("secret");
        assert_eq!(cfg.credentials(), Some(("secret", None)));

        let cfg = RedisConfig::new("a:1").with_user("admin", "secret");
        assert_eq!(cfg.credentials(), Some(("secret", Some("admin"))));

        let cfg = RedisConfig::new("a:1").with_user("admin", "");
        assert_eq!(cfg.credentials(), None);
    }

    #[test]
    fn test_service_rewrite_requires_both_names() {
        let mut cfg = RedisConfig::new("a:1");
        cfg.internal_service = Some("svc-internal".to_string());
        assert!(cfg.service_rewrite().is_none());

        let cfg = cfg.with_service_rewrite("svc-internal", "svc-external");
        let rewrite = cfg.service_rewrite().unwrap();
        assert_eq!(rewrite.apply("svc-internal:6380"), "svc-external:6380");
        assert_eq!(rewrite.apply("10.1.1.1:6380"), "10.1.1.1:6380");
    }

    #[test]
    fn test_rewrite_replaces_once() {
        let rewrite = ServiceRewrite::new("a", "b");
        assert_eq!(rewrite.apply("a.a:1"), "b.a:1");
    }

    #[test]
    fn test_io_timeout() {
        let cfg = RedisConfig::new("a:1").with_io_timeout(250);
        assert_eq!(cfg.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(cfg.write_timeout(), Some(Duration::from_millis(250)));
    }
}
