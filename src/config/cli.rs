//! Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::redis_config::{AuthConfig, RedisConfig, DEFAULT_CONNECT_TIMEOUT_MS};
use super::tls_config::TlsConfig;
use crate::utils::{Error, Result};

/// Inspect a Redis/Valkey node and its cluster slot ownership
#[derive(Parser, Debug, Clone)]
#[command(name = "shardwire")]
#[command(version, about, long_about = None)]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help information
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: Option<bool>,

    // ===== Connection Options =====
    /// Server hostname
    #[arg(short = 'h', long = "host", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short = 'p', long = "port", default_value_t = 6379)]
    pub port: u16,

    /// Password for AUTH command
    #[arg(short = 'a', long = "auth")]
    pub password: Option<String>,

    /// Username for ACL AUTH (requires --auth)
    #[arg(long = "user")]
    pub username: Option<String>,

    /// Dial timeout in milliseconds
    #[arg(long = "connect-timeout-ms", default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,

    /// Read/write deadline in milliseconds (unbounded when omitted)
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    // ===== TLS Options =====
    /// Enable TLS connection
    #[arg(long = "tls")]
    pub tls: bool,

    /// Skip TLS certificate verification (insecure)
    #[arg(long = "tls-skip-verify")]
    pub tls_skip_verify: bool,

    /// CA certificate file for TLS
    #[arg(long = "tls-ca-cert")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Server Name Indication for TLS
    #[arg(long = "tls-sni")]
    pub tls_sni: Option<String>,

    // ===== Address Rewrite =====
    /// Hostname fragment reported by cluster nodes (requires --external-service)
    #[arg(long = "internal-service")]
    pub internal_service: Option<String>,

    /// Replacement for --internal-service in reported node addresses
    #[arg(long = "external-service")]
    pub external_service: Option<String>,

    // ===== Output =====
    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect, authenticate and verify PING
    Ping,
    /// Print the slot ownership list from CLUSTER SLOTS
    Slots {
        /// Print as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Print slot ranges per node and check full slot coverage
    Nodes,
    /// Send one command and print its reply
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<()> {
        if self.username.is_some() && self.password.is_none() {
            return Err(Error::Config("--user requires --auth to be set".to_string()));
        }

        if (self.tls_skip_verify || self.tls_ca_cert.is_some() || self.tls_sni.is_some()) && !self.tls
        {
            return Err(Error::Config("TLS options require --tls".to_string()));
        }

        if self.internal_service.is_some() != self.external_service.is_some() {
            return Err(Error::Config(
                "--internal-service and --external-service must both be specified".to_string(),
            ));
        }

        if self.quiet && self.verbose {
            return Err(Error::Config("--quiet and --verbose are mutually exclusive".to_string()));
        }

        Ok(())
    }

    /// Build connection configuration
    pub fn to_config(&self) -> Result<RedisConfig> {
        self.validate()?;

        let auth = self.password.as_ref().map(|p| AuthConfig {
            password: p.clone(),
            username: self.username.clone(),
        });

        let tls = if self.tls {
            Some(TlsConfig {
                skip_verify: self.tls_skip_verify,
                ca_cert: self.tls_ca_cert.clone(),
                sni: self.tls_sni.clone(),
            })
        } else {
            None
        };

        Ok(RedisConfig {
            addresses: vec![format!("{}:{}", self.host, self.port)],
            auth,
            tls,
            connect_timeout_ms: self.connect_timeout_ms,
            read_timeout_ms: self.timeout_ms,
            write_timeout_ms: self.timeout_ms,
            external_service: self.external_service.clone(),
            internal_service: self.internal_service.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = CliArgs::parse_from(["test", "ping"]);
        assert_eq!(args.port, 6379);
        assert_eq!(args.command, Command::Ping);
        let cfg = args.to_config().unwrap();
        assert_eq!(cfg.addresses, vec!["127.0.0.1:6379"]);
        assert_eq!(cfg.connect_timeout_ms, 5_000);
        assert!(cfg.auth.is_none());
        assert!(cfg.tls.is_none());
    }

    #[test]
    fn test_full_config() {
        let args = CliArgs::parse_from([
            "test",
            "-h",
            "redis-0",
            "-p",
            "7000",
            "-a",
            "pw",
            "--user",
            "admin",
            "--tls",
            "--tls-skip-verify",
            "--timeout-ms",
            "1500",
            "--internal-service",
            "svc-internal",
            "--external-service",
            "svc-external",
            "slots",
            "--json",
        ]);
        assert_eq!(args.command, Command::Slots { json: true });
        let cfg = args.to_config().unwrap();
        assert_eq!(cfg.address(), Some("redis-0:7000"));
        assert_eq!(cfg.credentials(), Some(("pw", Some("admin"))));
        assert!(cfg.tls.as_ref().unwrap().skip_verify);
        assert_eq!(cfg.read_timeout_ms, Some(1500));
        assert!(cfg.service_rewrite().is_some());
    }

    #[test]
    fn test_exec_args() {
        let args = CliArgs::parse_from(["test", "exec", "CLUSTER", "SLOTS"]);
        assert_eq!(
            args.command,
            Command::Exec {
                args: vec!["CLUSTER".to_string(), "SLOTS".to_string()]
            }
        );
    }

    #[test]
    fn test_validation_user_without_auth() {
        let args = CliArgs::parse_from(["test", "--user", "admin", "ping"]);
        assert!(matches!(args.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_skip_verify_without_tls() {
        let args = CliArgs::parse_from(["test", "--tls-skip-verify", "ping"]);
        match args.to_config() {
            Err(e) => assert_eq!(e.to_string(), "Configuration error: TLS options require --tls"),
            Ok(_) => panic!("TLS options without --tls should be rejected"),
        }
    }

    #[test]
    fn test_validation_half_rewrite() {
        let args = CliArgs::parse_from(["test", "--internal-service", "svc", "nodes"]);
        assert!(args.validate().is_err());
    }
}
