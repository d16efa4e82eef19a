//! Per-stream handshake (component D). Every freshly opened bidirectional
//! QUIC stream carries exactly one negotiation before it is handed to the
//! caller as a `Pipe`: the dial side announces which path it wants, the
//! listen side looks the path up in the router and acks or aborts.
//!
//! [`text`] is the wire format this crate actually speaks: newline-
//! terminated lines, matching the original implementation's handshake
//! exactly (§9 resolves the ambiguity about exact framing by following the
//! original `quic.go`/`listener.go` behavior). [`binary`] is a compact
//! alternative header laid out in the spec's design notes as a forward-
//! compatibility option; it round-trips correctly but nothing in this
//! crate wires it up by default.

pub mod binary;
pub mod text;
