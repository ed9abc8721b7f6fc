//! Socket transports (TCP or TLS) behind one interface

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::config::{RedisConfig, TlsConfig};
use crate::utils::ConnectionError;

/// Byte stream a connection speaks RESP over
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Tears the socket down from outside the stream lock
///
/// Shutting down wakes a caller blocked in a read or write with an error.
pub trait SocketShutdown: Send + Sync {
    fn shutdown(&self) -> io::Result<()>;
}

impl SocketShutdown for TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// A dialed socket plus the handle used to shut it down
pub struct Dialed {
    pub stream: Box<dyn Transport>,
    pub shutdown: Box<dyn SocketShutdown>,
}

/// Dial the configured address, applying connect and I/O deadlines
pub fn dial(config: &RedisConfig) -> Result<Dialed, ConnectionError> {
    let address = config.address().ok_or(ConnectionError::NoAddress)?;
    let tls = config.tls_enabled();
    let dial_err = |source: io::Error| ConnectionError::DialFailed {
        address: address.to_string(),
        tls,
        source,
    };

    let addr = address
        .to_socket_addrs()
        .map_err(dial_err)?
        .next()
        .ok_or_else(|| dial_err(io::Error::new(io::ErrorKind::NotFound, "No addresses found")))?;

    let stream = TcpStream::connect_timeout(&addr, config.connect_timeout()).map_err(dial_err)?;
    stream.set_nodelay(true).ok();
    configure_timeouts(&stream, config.read_timeout(), config.write_timeout()).map_err(dial_err)?;

    let shutdown = stream.try_clone().map_err(dial_err)?;
    debug!("dialed {} (tls: {})", address, tls);

    match &config.tls {
        Some(tls_config) => {
            let host = address.rsplit_once(':').map(|(h, _)| h).unwrap_or(address);
            let tls_stream = connect_tls(stream, host, tls_config)?;
            Ok(Dialed {
                stream: tls_stream,
                shutdown: Box::new(shutdown),
            })
        }
        None => Ok(Dialed {
            stream: Box::new(stream),
            shutdown: Box::new(shutdown),
        }),
    }
}

fn configure_timeouts(
    stream: &TcpStream,
    read: Option<Duration>,
    write: Option<Duration>,
) -> io::Result<()> {
    stream.set_read_timeout(read)?;
    stream.set_write_timeout(write)
}

#[cfg(feature = "native-tls-backend")]
fn connect_tls(
    stream: TcpStream,
    host: &str,
    tls_config: &TlsConfig,
) -> Result<Box<dyn Transport>, ConnectionError> {
    use native_tls::{Certificate, TlsConnector};

    let mut builder = TlsConnector::builder();

    if tls_config.skip_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }

    if let Some(ref ca_path) = tls_config.ca_cert {
        let ca_data = std::fs::read(ca_path)
            .map_err(|e| ConnectionError::TlsFailed(format!("Failed to read CA cert: {}", e)))?;
        let cert = Certificate::from_pem(&ca_data)
            .map_err(|e| ConnectionError::TlsFailed(format!("Invalid CA cert: {}", e)))?;
        builder.add_root_certificate(cert);
    }

    let connector = builder
        .build()
        .map_err(|e| ConnectionError::TlsFailed(format!("Failed to build TLS connector: {}", e)))?;

    let tls_stream = connector
        .connect(tls_config.server_name(host), stream)
        .map_err(|e| ConnectionError::TlsFailed(format!("TLS handshake failed: {}", e)))?;

    Ok(Box::new(tls_stream))
}

#[cfg(not(feature = "native-tls-backend"))]
fn connect_tls(
    stream: TcpStream,
    _host: &str,
    _tls_config: &TlsConfig,
) -> Result<Box<dyn Transport>, ConnectionError> {
    let _ = stream.shutdown(Shutdown::Both);
    Err(ConnectionError::TlsFailed(
        "TLS support not compiled in".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_dial_without_address() {
        let cfg = RedisConfig::default();
        assert!(matches!(dial(&cfg), Err(ConnectionError::NoAddress)));
    }

    #[test]
    fn test_dial_refused_names_address() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let cfg = RedisConfig::new(format!("127.0.0.1:{}", port));
        match dial(&cfg) {
            Err(ConnectionError::DialFailed { address, tls, .. }) => {
                assert_eq!(address, format!("127.0.0.1:{}", port));
                assert!(!tls);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("dial should fail"),
        }
    }

    #[cfg(not(feature = "native-tls-backend"))]
    #[test]
    fn test_tls_without_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let cfg = RedisConfig::new(listener.local_addr().unwrap().to_string())
            .with_tls(TlsConfig::insecure());
        assert!(matches!(dial(&cfg), Err(ConnectionError::TlsFailed(_))));
    }
}
