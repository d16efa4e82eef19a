use std::io;

/// Error kinds surfaced to callers (§7). Each variant is one of the named
/// error kinds the spec distinguishes; callers match on these rather than
/// inspecting message strings.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `addr` failed to parse as a `quic://host:port/path` URL, or the
    /// scheme wasn't `quic`. Rejected before any resource is touched.
    #[error("url parse: {0}")]
    UrlParse(#[source] url::ParseError),

    /// The scheme component of an otherwise well-formed URL wasn't `quic`.
    #[error("url parse: unsupported scheme `{0}`")]
    UnsupportedScheme(String),

    /// A URL was missing the authority (`host:port`) component.
    #[error("url parse: missing authority")]
    MissingAuthority,

    /// `SetOption`/`GetOption` was called with an unrecognized key, or a
    /// recognized key with a value of the wrong type.
    #[error("bad option: {0}")]
    BadOption(String),

    /// The underlying QUIC dial failed.
    #[error("dial failed: {0}")]
    DialFailed(#[source] io::Error),

    /// The underlying QUIC listen failed.
    #[error("listen failed: {0}")]
    ListenFailed(#[source] io::Error),

    /// `register(path, ..)` was called on a path already occupied by
    /// another listener on the same authority.
    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    /// The per-stream handshake failed, either because of an I/O error or
    /// because the peer aborted with an explicit message (e.g. `404:<path>`).
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// `Recv` observed a declared length greater than the configured
    /// `MaxRecvSize`, or a negative/malformed length.
    #[error("message too large: {0} bytes (max {1})")]
    MessageTooLarge(u64, u64),

    /// `accept(path)`'s wait observed its channel closed (listener torn
    /// down) rather than delivering a stream.
    #[error("transport closed")]
    TransportClosed,

    /// `accept(path)` was bounded by `AcceptTimeout` and the bound elapsed.
    #[error("timed out waiting for a stream")]
    TimedOut,

    /// `GetProp` was called for a property the pipe doesn't expose.
    #[error("bad property: {0}")]
    BadProperty(String),

    /// Catch-all for I/O failures not covered by a more specific variant
    /// (e.g. writing/reading a pipe's length-prefixed frame).
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
