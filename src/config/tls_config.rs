//! TLS configuration

use std::path::PathBuf;

/// TLS configuration
///
/// Certificate verification is on unless `skip_verify` is set explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    pub skip_verify: bool,
    pub ca_cert: Option<PathBuf>,
    pub sni: Option<String>,
}

impl TlsConfig {
    /// TLS without certificate or hostname verification
    pub fn insecure() -> Self {
        Self {
            skip_verify: true,
            ..Self::default()
        }
    }

    /// Name presented for SNI and hostname verification
    pub fn server_name<'a>(&'a self, host: &'a str) -> &'a str {
        self.sni.as_deref().unwrap_or(host)
    }
}
