//! Core data model for the QUIC multiplexer transport: authorities, paths,
//! and the error kinds surfaced across the dial/listen/pipe call sites.

use std::fmt;
use std::net::SocketAddr;

mod error;
mod path;

pub use error::TransportError;
pub use path::canonicalize_path;

/// A `host:port` pair; the keying identity for sessions and listeners in the
/// multiplexer. Two listeners on different authorities never share
/// underlying QUIC state even if their paths collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Authority(String);

impl Authority {
    /// Build an authority from its canonical `host:port` text form.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The authority as it appears on the wire / in table keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host portion alone, stripped of `:port` — what goes into the
    /// QUIC handshake's SNI server name, as opposed to the dial address.
    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(host, _)| host)
    }

    /// Resolve to a concrete socket address. Authorities are always
    /// constructed from an already-resolved `host:port` (§4.I parses the
    /// URL's authority with `std::net::ToSocketAddrs` semantics before
    /// wrapping it), so this only fails if that invariant was violated.
    pub fn socket_addr(&self) -> Result<SocketAddr, TransportError> {
        self.0
            .parse()
            .map_err(|_| TransportError::BadOption(format!("authority `{}` is not a resolved socket address", self.0)))
    }
}

impl From<SocketAddr> for Authority {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized URL path: the keying identity for logical endpoints within
/// one authority. Construction always canonicalizes (collapses redundant
/// separators, resolves `.`/`..`), so two `Path` values are equal iff the
/// router would treat them as the same registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(String);

impl Path {
    /// Canonicalize and wrap a path string.
    pub fn new(raw: &str) -> Self {
        Self(canonicalize_path(raw))
    }

    /// The canonicalized path text, e.g. `/foo/bar`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
