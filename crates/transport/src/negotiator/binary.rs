//! Forward-compatibility alternative to [`super::text`]: a fixed binary
//! header instead of newline-delimited lines. Not wired into
//! [`crate::multiplexer::Multiplexer`] by default — nothing in this crate
//! constructs a stream using this variant yet — but it is kept available
//! for a future protocol-number bump, per the design notes' framing of it
//! as an explicit option rather than a planned replacement.
//!
//! Wire shape, all fields big-endian:
//!
//! ```text
//! request:  u16 proto | u64 path_hash
//! response: u16 status (0 = ok, 400 = bad request, 404 = not found)
//! ```
//!
//! `path_hash` is resolved against the router by the caller, which must
//! maintain its own `hash -> path` table; this module only handles framing.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use quic_mux_types::TransportError;

/// Protocol discriminator for this header shape, distinct from the SP
/// protocol numbers exchanged at the socket layer.
pub const PROTO: u16 = 1;

pub const STATUS_OK: u16 = 0;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;

fn io_err(e: std::io::Error) -> TransportError {
    TransportError::Io(e)
}

/// Hash a path the same way on both sides of the handshake. FNV-1a is
/// used for its simplicity and stability across builds; this is not a
/// security boundary, only a router key.
pub fn hash_path(path: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    path.bytes().fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

pub async fn dial_negotiate<S, R>(send: &mut S, recv: &mut R, path: &str) -> Result<(), TransportError>
where
    S: tokio::io::AsyncWrite + Unpin,
    R: tokio::io::AsyncRead + Unpin,
{
    send.write_u16(PROTO).await.map_err(io_err)?;
    send.write_u64(hash_path(path)).await.map_err(io_err)?;

    let status = recv.read_u16().await.map_err(io_err)?;
    match status {
        STATUS_OK => Ok(()),
        STATUS_NOT_FOUND => Err(TransportError::NegotiationFailed(format!("404:{path}"))),
        other => Err(TransportError::NegotiationFailed(format!("{other}:{path}"))),
    }
}

/// Listen-side half. `resolve` maps a path hash back to a known path,
/// returning `None` if nothing registered that hash.
pub async fn listen_negotiate<S, R>(
    send: &mut S,
    recv: &mut R,
    resolve: impl Fn(u64) -> Option<String>,
) -> Result<String, TransportError>
where
    S: tokio::io::AsyncWrite + Unpin,
    R: tokio::io::AsyncRead + Unpin,
{
    let proto = recv.read_u16().await.map_err(io_err)?;
    if proto != PROTO {
        send.write_u16(STATUS_BAD_REQUEST).await.map_err(io_err)?;
        return Err(TransportError::NegotiationFailed(format!(
            "400:unsupported protocol {proto}"
        )));
    }

    let path_hash = recv.read_u64().await.map_err(io_err)?;
    match resolve(path_hash) {
        Some(path) => {
            send.write_u16(STATUS_OK).await.map_err(io_err)?;
            Ok(path)
        }
        None => {
            send.write_u16(STATUS_NOT_FOUND).await.map_err(io_err)?;
            Err(TransportError::NegotiationFailed(format!("404:{path_hash:x}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_on_match() {
        let (mut dial_send, mut listen_recv) = duplex(64);
        let (mut listen_send, mut dial_recv) = duplex(64);

        let dial = tokio::spawn(async move { dial_negotiate(&mut dial_send, &mut dial_recv, "/pair").await });
        let resolved = listen_negotiate(&mut listen_send, &mut listen_recv, |h| {
            (h == hash_path("/pair")).then(|| "/pair".to_string())
        })
        .await
        .unwrap();

        assert_eq!(resolved, "/pair");
        dial.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unresolved_hash_yields_404() {
        let (mut dial_send, mut listen_recv) = duplex(64);
        let (mut listen_send, mut dial_recv) = duplex(64);

        let dial = tokio::spawn(async move { dial_negotiate(&mut dial_send, &mut dial_recv, "/missing").await });
        let err = listen_negotiate(&mut listen_send, &mut listen_recv, |_| None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NegotiationFailed(_)));
        assert!(dial.await.unwrap().is_err());
    }
}
