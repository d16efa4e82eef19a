//! Transport factory (component I, §4.I). Every `quic://host:port/path`
//! URL a host socket hands us is validated and normalized here, once,
//! before any multiplexer table is touched — malformed input must never
//! reach `load_or_create_listener`/`load_or_create_session`.

use std::net::ToSocketAddrs;
use std::sync::{Arc, OnceLock};

use url::Url;

use quic_mux_types::{Authority, Path, TransportError};

use crate::dial::QuicDialer;
use crate::listen::QuicListenerAdapter;
use crate::multiplexer::Multiplexer;
use crate::{Dialer, HostSocket, Listener};

/// The only scheme this transport understands, per §6.
pub const SCHEME: &str = "quic";

fn parse_url(addr: &str) -> Result<(Authority, Path, std::net::SocketAddr), TransportError> {
    let url = Url::parse(addr).map_err(TransportError::UrlParse)?;
    if url.scheme() != SCHEME {
        return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(TransportError::MissingAuthority)?;
    let port = url.port().ok_or(TransportError::MissingAuthority)?;
    let authority_text = format!("{host}:{port}");

    let socket_addr = authority_text
        .to_socket_addrs()
        .map_err(TransportError::DialFailed)?
        .next()
        .ok_or(TransportError::MissingAuthority)?;

    let path = Path::new(url.path());
    Ok((Authority::new(authority_text), path, socket_addr))
}

/// Builds dialers and listeners bound to one shared [`Multiplexer`]
/// instance. The spec's "process-wide singleton" (§9) is an injectable
/// instance here: production callers use [`QuicTransportFactory::shared`],
/// tests construct independent factories with [`QuicTransportFactory::new`].
#[derive(Clone)]
pub struct QuicTransportFactory {
    mux: Arc<Multiplexer>,
}

impl QuicTransportFactory {
    /// A factory backed by its own, independent multiplexer instance.
    pub fn new() -> Self {
        Self { mux: Multiplexer::new() }
    }

    /// The process-wide default factory (§9: "the production factory may
    /// expose a default instance for convenience"). Every caller that
    /// goes through this accessor shares one multiplexer; tests that need
    /// isolation should use [`QuicTransportFactory::new`] instead.
    pub fn shared() -> &'static Self {
        static SHARED: OnceLock<QuicTransportFactory> = OnceLock::new();
        SHARED.get_or_init(QuicTransportFactory::new)
    }

    /// The scheme this factory's URLs must use.
    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    /// Build a dialer for `addr`, bound to this factory's multiplexer.
    pub fn new_dialer(&self, addr: &str, socket: Arc<dyn HostSocket>) -> Result<Arc<dyn Dialer>, TransportError> {
        let (authority, path, remote_addr) = parse_url(addr)?;
        Ok(Arc::new(QuicDialer::new(Arc::clone(&self.mux), authority, path, remote_addr, socket)))
    }

    /// Build a listener for `addr`, bound to this factory's multiplexer.
    pub fn new_listener(&self, addr: &str, socket: Arc<dyn HostSocket>) -> Result<Arc<dyn Listener>, TransportError> {
        let (authority, path, bind_addr) = parse_url(addr)?;
        Ok(Arc::new(QuicListenerAdapter::new(Arc::clone(&self.mux), authority, path, bind_addr, socket)))
    }
}

impl Default for QuicTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSocket;
    impl HostSocket for FakeSocket {
        fn local_protocol(&self) -> u16 {
            0
        }
        fn peer_protocol(&self) -> u16 {
            0
        }
        fn max_recv_size(&self) -> i64 {
            0
        }
    }

    #[test]
    fn rejects_non_quic_scheme() {
        let factory = QuicTransportFactory::new();
        let err = factory.new_dialer("tcp://127.0.0.1:9001/foo", Arc::new(FakeSocket)).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedScheme(s) if s == "tcp"));
    }

    #[test]
    fn rejects_missing_port() {
        let factory = QuicTransportFactory::new();
        let err = factory.new_dialer("quic://127.0.0.1/foo", Arc::new(FakeSocket)).unwrap_err();
        assert!(matches!(err, TransportError::MissingAuthority));
    }

    #[test]
    fn normalizes_path() {
        let (_, path, _) = parse_url("quic://127.0.0.1:9001//foo//bar/").unwrap();
        assert_eq!(path.as_str(), "/foo/bar");
    }

    #[test]
    fn accepts_well_formed_url() {
        let factory = QuicTransportFactory::new();
        factory.new_dialer("quic://127.0.0.1:9001/foo", Arc::new(FakeSocket)).unwrap();
        factory.new_listener("quic://127.0.0.1:9001/foo", Arc::new(FakeSocket)).unwrap();
    }
}
