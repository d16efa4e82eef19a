//! Property-based tests for the QUIC multiplexer transport (spec §8).
//!
//! Router duplicate-path rejection, ref-count fail-fast behavior, and
//! path canonicalization already have focused unit-level proptest
//! coverage inside the crate (`router.rs`, `refcount.rs`, `path.rs`); this
//! file covers the one property that needs a real QUIC round trip —
//! frame send/recv round-tripping arbitrary payloads up to `MaxRecvSize`
//! (§8 property 6) — plus path canonicalization equivalences exercised
//! from outside the crate, against the public `quic_mux_types` surface.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use proptest::prelude::*;

use quic_mux_transport::{HostSocket, QuicTransportFactory};
use quic_mux_types::canonicalize_path;

struct TestSocket {
    max_recv_size: i64,
}

impl HostSocket for TestSocket {
    fn local_protocol(&self) -> u16 {
        0x0010
    }

    fn peer_protocol(&self) -> u16 {
        0x0010
    }

    fn max_recv_size(&self) -> i64 {
        self.max_recv_size
    }
}

static NEXT_PORT: AtomicU16 = AtomicU16::new(19601);

/// Dial, accept, send `body`, and assert it round-trips exactly through
/// `Recv`, on a fresh authority/path pair so each proptest case is fully
/// isolated from the others.
async fn round_trip(body: &[u8]) {
    let factory = QuicTransportFactory::new();
    let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
    let url = format!("quic://127.0.0.1:{port}/roundtrip");

    let socket = Arc::new(TestSocket {
        max_recv_size: 1 << 20,
    });

    let listener = factory.new_listener(&url, socket.clone()).unwrap();
    listener.listen().await.unwrap();

    let dialer = factory.new_dialer(&url, socket).unwrap();
    let body_owned = body.to_vec();
    let dial_task = tokio::spawn(async move {
        let pipe = dialer.dial().await.unwrap();
        pipe.send(&[], &body_owned).await.unwrap();
        pipe
    });

    let accept_pipe = listener.accept().await.unwrap();
    let received = accept_pipe.recv().await.unwrap();
    assert_eq!(received.as_ref(), body);

    let _dial_pipe = dial_task.await.unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property 6: any byte string of length 0..=65536 sent over a pipe
    /// is received back byte-for-byte on the peer.
    #[test]
    fn prop_send_recv_round_trips(body in prop::collection::vec(any::<u8>(), 0..65536)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(round_trip(&body));
    }

    /// Inserting harmless extra `.`/`` segments or duplicate slashes into
    /// a path never changes its canonical form.
    #[test]
    fn prop_canonicalize_ignores_cosmetic_noise(segments in prop::collection::vec("[a-zA-Z0-9_-]{1,12}", 0..6)) {
        let clean = format!("/{}", segments.join("/"));
        let noisy = format!("//{}//", segments.iter().map(|s| format!("{s}/.")).collect::<Vec<_>>().join("//"));
        prop_assert_eq!(canonicalize_path(&clean), canonicalize_path(&noisy));
    }
}
