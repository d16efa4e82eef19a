//! QUIC transport adapter for Scalability-Protocols-style messaging
//! sockets (PAIR, STAR, PUB/SUB, ...): a process-wide multiplexer that
//! shares one QUIC endpoint per local authority and one QUIC session per
//! remote authority across many logical `quic://host:port/path` sockets.
//!
//! The externally visible contract (§6) is exactly three entry points:
//! [`QuicTransportFactory::new_dialer`]/[`QuicTransportFactory::new_listener`]
//! build the adapter pair a host socket library drives; [`Dialer`] and
//! [`Listener`] are the traits it drives them through, and [`Pipe`] is
//! what either adapter eventually hands back — a framed byte-stream over
//! one QUIC stream. Everything else (the path router, the ref-counted
//! listener/session records, the per-stream negotiator, the multiplexer
//! registry itself) is internal plumbing described in `DESIGN.md`.

mod dial;
mod factory;
mod listen;
mod multiplexer;
mod negotiator;
mod options;
mod pipe;
mod refcount;
mod router;
mod tls;

pub use dial::QuicDialer;
pub use factory::{QuicTransportFactory, SCHEME};
pub use listen::QuicListenerAdapter;
pub use options::{OptionValue, OptionsStore, ACCEPT_TIMEOUT, QUIC_TLS_CONFIG, QUIC_UDP_CONFIG};
pub use pipe::Pipe;

use async_trait::async_trait;

use quic_mux_types::TransportError;

/// The subset of the host socket's own state this crate needs to cache
/// into every [`Pipe`] it creates (§4.H): the messaging-protocol numbers
/// a socket library negotiates at a layer above this one, and the
/// receive-side size bound it enforces. The socket library implements
/// this; the multiplexer never constructs one itself.
pub trait HostSocket: Send + Sync {
    /// This socket's own messaging protocol number (e.g. PAIR's `0x0010`).
    fn local_protocol(&self) -> u16;

    /// The protocol number this socket expects its peer to present.
    /// Equal to `local_protocol()` for symmetric patterns like PAIR.
    fn peer_protocol(&self) -> u16;

    /// Maximum accepted `Recv` length; `<= 0` means unlimited (§6).
    fn max_recv_size(&self) -> i64;
}

/// The dial side of the adapter pair (§4.F, §6). One instance dials one
/// path at one remote authority, reusing a shared QUIC session when a
/// sibling dialer on the same authority already has one open.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial the configured path, returning a usable pipe or the reason it
    /// failed (dial failure, negotiation failure, ...).
    async fn dial(&self) -> Result<Pipe, TransportError>;

    fn set_option(&self, name: &str, value: OptionValue) -> Result<(), TransportError>;
    fn get_option(&self, name: &str) -> Result<OptionValue, TransportError>;
}

/// The listen side of the adapter pair (§4.G, §6). One instance owns one
/// path registration; `listen()` joins (or creates) the shared endpoint
/// for its authority, and repeated `accept()` calls drain pipes as
/// dialers arrive.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Bind the shared endpoint for this authority (if not already bound)
    /// and register this listener's path. Idempotent.
    async fn listen(&self) -> Result<(), TransportError>;

    /// Wait for and return the next pipe dialed to this listener's path.
    async fn accept(&self) -> Result<Pipe, TransportError>;

    /// Unregister this listener's path and release its share of the
    /// underlying endpoint.
    async fn close(&self) -> Result<(), TransportError>;

    /// The local authority this listener is bound to.
    fn address(&self) -> String;

    fn set_option(&self, name: &str, value: OptionValue) -> Result<(), TransportError>;
    fn get_option(&self, name: &str) -> Result<OptionValue, TransportError>;
}
