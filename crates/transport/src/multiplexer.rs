//! The process-wide multiplexer (component E, §4.E). One `Multiplexer`
//! per process backs every dialer and listener this crate hands out: it
//! owns the listener table (key: local authority string), the session
//! table (key: a dial/accept-disambiguated authority or remote-address
//! string), and the path router. Table mutations and the QUIC calls that
//! seed them are a single critical section (§3) — see
//! [`Multiplexer::load_or_create_listener`] and
//! [`Multiplexer::load_or_create_session`], which hold the write lock
//! across the bind/connect call itself.
//!
//! Open question (b) (§9) — whether a listener's accept loop should count
//! as a ref-count holder in its own right — is resolved here as yes: the
//! loop started in [`Multiplexer::load_or_create_listener`] takes its own
//! share via [`Record::incr`], on top of the baseline share returned to
//! the first registering adapter. [`Multiplexer::release_listener`] closes
//! the underlying endpoint as soon as every adapter share is gone (count
//! reaches 1, the loop's own share), which unblocks the loop's pending
//! `accept()` so it can release that last share and let the table entry
//! actually be removed. This is documented in `DESIGN.md`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};

use quic_mux_types::TransportError;

use crate::negotiator;
use crate::options::OptionsStore;
use crate::refcount::Record;
use crate::router::PathRouter;

/// A stream that has finished its per-stream handshake and is ready to be
/// wrapped in a [`crate::pipe::Pipe`] by whichever listener's `accept`
/// call receives it.
pub struct NegotiatedStream {
    pub send: quinn::SendStream,
    pub recv: quinn::RecvStream,
    pub remote_addr: SocketAddr,
}

pub struct Multiplexer {
    listeners: RwLock<HashMap<String, Arc<Record<quinn::Endpoint>>>>,
    sessions: RwLock<HashMap<String, Arc<Record<quinn::Connection>>>>,
    router: PathRouter,
    client_endpoint: OnceCell<quinn::Endpoint>,
}

impl Multiplexer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            router: PathRouter::new(),
            client_endpoint: OnceCell::new(),
        })
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    // -- listener side (component G's backing store) --------------------

    /// Load the listener endpoint bound to `authority`, or bind a new one
    /// and start its accept loop. Returns the record, already incremented
    /// for the calling adapter.
    pub async fn load_or_create_listener(
        self: &Arc<Self>,
        authority: &str,
        bind_addr: SocketAddr,
        options: &OptionsStore,
    ) -> Result<Arc<Record<quinn::Endpoint>>, TransportError> {
        let mut table = self.listeners.write().await;
        if let Some(existing) = table.get(authority) {
            return Ok(existing.incr());
        }

        let server_config = options.server_quic_config()?;
        let endpoint =
            quinn::Endpoint::server(server_config, bind_addr).map_err(TransportError::ListenFailed)?;
        let record = Record::new(endpoint, |ep| ep.close(0u32.into(), b"listener closed"));
        table.insert(authority.to_string(), Arc::clone(&record));
        drop(table);

        // §9 open question (b): the accept loop is itself a ref-count
        // holder, not a bystander — it gets its own share on top of the
        // one this call returns to the calling adapter (§8 invariant 3).
        let loop_record = record.incr();
        let mux = Arc::clone(self);
        let key = authority.to_string();
        tokio::spawn(async move { mux.listener_accept_loop(key, loop_record).await });

        Ok(record)
    }

    /// Release one holder's share of a listener record. Because the
    /// accept loop itself holds a share (see [`Multiplexer::load_or_create_listener`]),
    /// the record's underlying endpoint is closed as soon as every
    /// *adapter* share is gone — one count short of zero — so the loop's
    /// blocked `accept()` unblocks and the loop can release its own
    /// share; the table entry itself is only removed once that happens
    /// and the count actually reaches zero. Table removal double-checks,
    /// via `Arc::ptr_eq`, that the entry under `authority` is still this
    /// exact record before deleting it — a fresh record may already have
    /// replaced it if the authority was rebound in between.
    pub async fn release_listener(&self, authority: &str, record: &Arc<Record<quinn::Endpoint>>) {
        match record.decr() {
            1 => record.close(),
            0 => {
                let mut table = self.listeners.write().await;
                if table.get(authority).is_some_and(|existing| Arc::ptr_eq(existing, record)) {
                    table.remove(authority);
                }
            }
            _ => {}
        }
    }

    async fn listener_accept_loop(self: Arc<Self>, authority: String, record: Arc<Record<quinn::Endpoint>>) {
        loop {
            let incoming = match record.get().accept().await {
                Some(incoming) => incoming,
                None => break, // endpoint closed
            };
            let conn = match incoming.await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::debug!(%authority, error = %e, "incoming QUIC handshake failed");
                    continue;
                }
            };

            let remote = conn.remote_address();
            let session_key = format!("accept:{remote}");
            let session_record = Record::new(conn, |c| c.close(0u32.into(), b"session closed"));
            self.sessions
                .write()
                .await
                .insert(session_key.clone(), Arc::clone(&session_record));

            tracing::debug!(%authority, %remote, "accepted QUIC session");

            let mux = Arc::clone(&self);
            tokio::spawn(async move { mux.serve(session_key, session_record).await });
        }
        tracing::debug!(%authority, "listener accept loop exiting");
        self.release_listener(&authority, &record).await;
    }

    // -- session side (component F's backing store, plus the listen-side
    //    sessions the accept loop above populates) ----------------------

    /// Load the session connected to `remote_addr` under `key`, or dial a
    /// new one. Returns the record, already incremented for the caller.
    pub async fn load_or_create_session(
        self: &Arc<Self>,
        key: &str,
        remote_addr: SocketAddr,
        server_name: &str,
        options: &OptionsStore,
    ) -> Result<Arc<Record<quinn::Connection>>, TransportError> {
        let mut table = self.sessions.write().await;
        if let Some(existing) = table.get(key) {
            return Ok(existing.incr());
        }

        let client_config = options.client_quic_config()?;
        let endpoint = self.client_endpoint(client_config.clone()).await?;
        let connecting = endpoint
            .connect(remote_addr, server_name)
            .map_err(|e| TransportError::DialFailed(std::io::Error::other(e)))?;
        let conn = connecting
            .await
            .map_err(|e| TransportError::DialFailed(std::io::Error::other(e)))?;

        let record = Record::new(conn, |c| c.close(0u32.into(), b"session closed"));
        table.insert(key.to_string(), Arc::clone(&record));

        let mux = Arc::clone(self);
        let key_owned = key.to_string();
        let loop_record = Arc::clone(&record);
        tokio::spawn(async move { mux.serve(key_owned, loop_record).await });

        Ok(record)
    }

    /// Release one holder's share of a session record. Table removal
    /// double-checks, via `Arc::ptr_eq`, that the entry under `key` is
    /// still this exact record — a stale connection-drop release racing
    /// a fresh dial to the same authority must not delete the new
    /// session out from under it.
    pub async fn release_session(&self, key: &str, record: &Arc<Record<quinn::Connection>>) {
        if record.decr() == 0 {
            record.close();
            let mut table = self.sessions.write().await;
            if table.get(key).is_some_and(|existing| Arc::ptr_eq(existing, record)) {
                table.remove(key);
            }
        }
    }

    /// A single shared client endpoint, bound lazily on first dial. QUIC
    /// client endpoints aren't tied to a single remote host, so one
    /// endpoint serves every dialer in the process (mirroring how a
    /// single UDP socket underlies arbitrarily many outbound sessions).
    async fn client_endpoint(&self, client_config: quinn::ClientConfig) -> Result<quinn::Endpoint, TransportError> {
        let endpoint = self
            .client_endpoint
            .get_or_try_init(|| async {
                let unspecified: SocketAddr = "0.0.0.0:0".parse().expect("valid literal address");
                let mut endpoint = quinn::Endpoint::client(unspecified).map_err(TransportError::DialFailed)?;
                endpoint.set_default_client_config(client_config);
                Ok::<_, TransportError>(endpoint)
            })
            .await?;
        Ok(endpoint.clone())
    }

    /// Per-session stream-accept loop: every bidirectional stream the
    /// peer opens on `record`'s connection gets its own negotiation task.
    /// Exits (and drops the session from the table) once the connection
    /// itself closes.
    async fn serve(self: Arc<Self>, session_key: String, record: Arc<Record<quinn::Connection>>) {
        let remote_addr = record.get().remote_address();
        loop {
            match record.get().accept_bi().await {
                Ok((send, recv)) => {
                    let mux = Arc::clone(&self);
                    tokio::spawn(async move { mux.route_stream(send, recv, remote_addr).await });
                }
                Err(e) => {
                    tracing::debug!(%session_key, error = %e, "session stream-accept loop exiting");
                    break;
                }
            }
        }
        let mut table = self.sessions.write().await;
        if table.get(&session_key).is_some_and(|existing| Arc::ptr_eq(existing, &record)) {
            table.remove(&session_key);
        }
    }

    /// Negotiate one freshly accepted stream and, on success, hand it to
    /// the path's registered channel.
    async fn route_stream(self: Arc<Self>, mut send: quinn::SendStream, mut recv: quinn::RecvStream, remote_addr: SocketAddr) {
        match negotiator::text::listen_negotiate(&mut send, &mut recv, &self.router).await {
            Ok((path, sender)) => {
                let stream = NegotiatedStream { send, recv, remote_addr };
                if sender.send(stream).await.is_err() {
                    tracing::debug!(%path, "negotiated stream dropped: no accept() waiting");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "stream negotiation failed");
            }
        }
    }
}
