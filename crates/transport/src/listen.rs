//! The listen adapter (component G, §4.G). One `QuicListenerAdapter` per
//! `(authority, path)` pair a caller has bound. Several adapters on the
//! same authority but different paths share one underlying QUIC endpoint,
//! reference-counted through [`Multiplexer::load_or_create_listener`].
//!
//! `listen()` registers the path with the router once, lazily, the first
//! time it's needed; `accept()` then simply waits on the same channel
//! every time it's called, which is what lets a listener accept many
//! pipes over its lifetime rather than exactly one (the literal reading of
//! "create a channel, register it, receive one stream" in §4.G describes
//! what happens the first time — the channel persists across repeat
//! `accept()` calls, matching how a socket library drives `Accept()` in a
//! loop).

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use quic_mux_types::{Authority, Path, TransportError};

use crate::multiplexer::{Multiplexer, NegotiatedStream};
use crate::options::{OptionsStore, OptionValue};
use crate::pipe::Pipe;
use crate::refcount::Record;
use crate::HostSocket;

pub struct QuicListenerAdapter {
    mux: Arc<Multiplexer>,
    authority: Authority,
    path: Path,
    bind_addr: SocketAddr,
    options: Arc<OptionsStore>,
    socket: Arc<dyn HostSocket>,
    // Split into two independent locks so a pending `accept()` — which
    // must block on `receiver` for an unbounded time — never holds a lock
    // that `close()` also needs. `close()` only ever touches `record`.
    record: Mutex<Option<Arc<Record<quinn::Endpoint>>>>,
    receiver: Mutex<Option<mpsc::Receiver<NegotiatedStream>>>,
}

impl QuicListenerAdapter {
    pub(crate) fn new(
        mux: Arc<Multiplexer>,
        authority: Authority,
        path: Path,
        bind_addr: SocketAddr,
        socket: Arc<dyn HostSocket>,
    ) -> Self {
        Self {
            mux,
            authority,
            path,
            bind_addr,
            options: Arc::new(OptionsStore::new()),
            socket,
            record: Mutex::new(None),
            receiver: Mutex::new(None),
        }
    }

    /// Bind (or join) the shared endpoint for this authority and register
    /// this adapter's path in the router. Idempotent: calling `listen()`
    /// again on an already-listening adapter is a no-op.
    pub async fn listen(&self) -> Result<(), TransportError> {
        let mut record_guard = self.record.lock().await;
        if record_guard.is_some() {
            return Ok(());
        }

        let record = self
            .mux
            .load_or_create_listener(self.authority.as_str(), self.bind_addr, &self.options)
            .await?;

        let (tx, rx) = mpsc::channel(1);
        if let Err(e) = self.mux.router().register(self.path.as_str(), tx) {
            self.mux.release_listener(self.authority.as_str(), &record).await;
            return Err(e);
        }

        *self.receiver.lock().await = Some(rx);
        *record_guard = Some(record);
        Ok(())
    }

    /// Wait for the next pipe dialed to this adapter's path. Bounded by
    /// `AcceptTimeout` when that option has been set (§9), and cancelled
    /// early if a concurrent `close()` tears the listener down first —
    /// a pending `accept()` must not block `close()` out forever, nor
    /// sit unblocked after the listener it's waiting on is gone.
    pub async fn accept(&self) -> Result<Pipe, TransportError> {
        let record = self
            .record
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(TransportError::TransportClosed)?;

        let mut done_rx = record.subscribe_done();
        if *done_rx.borrow() {
            return Err(TransportError::TransportClosed);
        }

        let mut receiver_guard = self.receiver.lock().await;
        let receiver = receiver_guard.as_mut().ok_or(TransportError::TransportClosed)?;

        let recv_fut = receiver.recv();
        let next = match self.options.accept_timeout() {
            Some(timeout) => {
                tokio::select! {
                    res = tokio::time::timeout(timeout, recv_fut) => res.map_err(|_| TransportError::TimedOut)?,
                    _ = done_rx.changed() => return Err(TransportError::TransportClosed),
                }
            }
            None => {
                tokio::select! {
                    res = recv_fut => res,
                    _ = done_rx.changed() => return Err(TransportError::TransportClosed),
                }
            }
        };

        let stream = next.ok_or(TransportError::TransportClosed)?;

        // Listen-side pipes hold no session-release hook: the session
        // they arrived on is already tracked and released by the
        // multiplexer's own accept loop (its stream-accept loop removes
        // the session from the table once the connection itself closes),
        // not by this adapter or its pipes.
        Ok(Pipe::new(
            stream.send,
            stream.recv,
            self.socket.local_protocol(),
            self.socket.peer_protocol(),
            self.socket.max_recv_size(),
            stream.remote_addr,
            || {},
        ))
    }

    /// Unregister this adapter's path and release its share of the
    /// underlying listener. Tears the shared endpoint down once every
    /// adapter on this authority has closed (§8 invariant 3). Never
    /// touches `receiver`'s lock, so a concurrently blocked `accept()`
    /// can't hold this up — `release_listener` closing the endpoint is
    /// what wakes that `accept()` via the done-signal instead.
    pub async fn close(&self) -> Result<(), TransportError> {
        let mut record_guard = self.record.lock().await;
        if let Some(record) = record_guard.take() {
            self.mux.router().unregister(self.path.as_str());
            self.mux.release_listener(self.authority.as_str(), &record).await;
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        self.authority.as_str().to_string()
    }

    pub fn set_option(&self, name: &str, value: OptionValue) -> Result<(), TransportError> {
        self.options.set(name, value)
    }

    pub fn get_option(&self, name: &str) -> Result<OptionValue, TransportError> {
        self.options.get(name)
    }
}

#[async_trait]
impl crate::Listener for QuicListenerAdapter {
    async fn listen(&self) -> Result<(), TransportError> {
        QuicListenerAdapter::listen(self).await
    }

    async fn accept(&self) -> Result<Pipe, TransportError> {
        QuicListenerAdapter::accept(self).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        QuicListenerAdapter::close(self).await
    }

    fn address(&self) -> String {
        QuicListenerAdapter::address(self)
    }

    fn set_option(&self, name: &str, value: OptionValue) -> Result<(), TransportError> {
        QuicListenerAdapter::set_option(self, name, value)
    }

    fn get_option(&self, name: &str) -> Result<OptionValue, TransportError> {
        QuicListenerAdapter::get_option(self, name)
    }
}
