//! The authoritative handshake: a `\n`-terminated path line from the
//! dialer, answered by either a bare `\n` (accepted) or a `400:`/`404:`
//! prefixed line (rejected), mirroring the original Go transport's
//! handshake byte-for-byte.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use quic_mux_types::TransportError;

use crate::router::{PathRouter, PathSender};

fn io_err(e: std::io::Error) -> TransportError {
    TransportError::Io(e)
}

/// Dial-side half of the handshake: announce `path`, then read back either
/// an empty line (success) or an error line, which becomes the text of a
/// [`TransportError::NegotiationFailed`].
pub async fn dial_negotiate<S, R>(send: &mut S, recv: &mut R, path: &str) -> Result<(), TransportError>
where
    S: tokio::io::AsyncWrite + Unpin,
    R: tokio::io::AsyncRead + Unpin,
{
    send.write_all(path.as_bytes()).await.map_err(io_err)?;
    send.write_all(b"\n").await.map_err(io_err)?;

    let mut reader = BufReader::new(recv);
    let mut line = String::new();
    reader.read_line(&mut line).await.map_err(io_err)?;
    let line = line.trim_end_matches('\n');

    if line.is_empty() {
        Ok(())
    } else {
        Err(TransportError::NegotiationFailed(line.to_string()))
    }
}

/// Listen-side half of the handshake: read the requested path, look it up
/// in `router`, and either ack (returning the path and the channel to hand
/// the stream to) or write a `400:`/`404:` line and fail.
pub async fn listen_negotiate<S, R>(
    send: &mut S,
    recv: &mut R,
    router: &PathRouter,
) -> Result<(String, PathSender), TransportError>
where
    S: tokio::io::AsyncWrite + Unpin,
    R: tokio::io::AsyncRead + Unpin,
{
    let mut reader = BufReader::new(recv);
    let mut line = String::new();
    let read = reader.read_line(&mut line).await.map_err(io_err);

    let path = match read {
        Ok(0) => {
            let msg = "400:empty request".to_string();
            let _ = send.write_all(msg.as_bytes()).await;
            let _ = send.write_all(b"\n").await;
            return Err(TransportError::NegotiationFailed(msg));
        }
        Ok(_) => line.trim_end_matches('\n').to_string(),
        Err(e) => {
            let msg = format!("400:{e}");
            let _ = send.write_all(msg.as_bytes()).await;
            let _ = send.write_all(b"\n").await;
            return Err(TransportError::NegotiationFailed(msg));
        }
    };

    let sender = match router.lookup(&path) {
        Some(sender) => sender,
        None => {
            let msg = format!("404:{path}");
            let _ = send.write_all(msg.as_bytes()).await;
            let _ = send.write_all(b"\n").await;
            return Err(TransportError::NegotiationFailed(msg));
        }
    };

    send.write_all(b"\n").await.map_err(io_err)?;
    Ok((path, sender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn happy_path_round_trips() {
        let router = PathRouter::new();
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        router.register("/pair", tx).unwrap();

        let (mut dial_send, mut listen_recv) = duplex(256);
        let (mut listen_send, mut dial_recv) = duplex(256);

        let dial = tokio::spawn(async move { dial_negotiate(&mut dial_send, &mut dial_recv, "/pair").await });
        let (path, _sender) = listen_negotiate(&mut listen_send, &mut listen_recv, &router)
            .await
            .unwrap();
        assert_eq!(path, "/pair");
        dial.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let router = PathRouter::new();

        let (mut dial_send, mut listen_recv) = duplex(256);
        let (mut listen_send, mut dial_recv) = duplex(256);

        let dial = tokio::spawn(async move { dial_negotiate(&mut dial_send, &mut dial_recv, "/missing").await });
        let err = listen_negotiate(&mut listen_send, &mut listen_recv, &router)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NegotiationFailed(m) if m == "404:/missing"));

        let dial_err = dial.await.unwrap().unwrap_err();
        assert!(matches!(dial_err, TransportError::NegotiationFailed(m) if m == "404:/missing"));
    }

    #[tokio::test]
    async fn empty_request_returns_400() {
        let router = PathRouter::new();
        // One duplex pair stands in for the incoming stream's read half:
        // close the peer without writing anything so read_line sees EOF.
        let (peer, mut listen_recv) = duplex(256);
        drop(peer);
        // A second, unrelated pair stands in for the reply write half.
        let (mut listen_send, _unused) = duplex(256);

        let err = listen_negotiate(&mut listen_send, &mut listen_recv, &router)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NegotiationFailed(m) if m.starts_with("400:")));
    }
}
