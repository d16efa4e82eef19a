//! The dial adapter (component F, §4.F). `dial()` follows the five-step
//! sequence the spec lays out: load-or-create the session, open a stream,
//! negotiate the path, install the session-release hook, and hand back a
//! pipe. Any failure before the hook is installed must still release the
//! ref-count share this call picked up in step 1 — there is no later
//! chance to do so once the hook would have (§9 resolves this as an
//! unconditional release, not one gated on whether this call happened to
//! be the one that created the session).

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use quic_mux_types::{Authority, Path, TransportError};

use crate::multiplexer::Multiplexer;
use crate::negotiator;
use crate::options::{OptionsStore, OptionValue};
use crate::pipe::Pipe;
use crate::HostSocket;

/// Dials a single path on a single remote authority, reusing an existing
/// QUIC session to that authority if one is already open.
pub struct QuicDialer {
    mux: Arc<Multiplexer>,
    authority: Authority,
    path: Path,
    remote_addr: SocketAddr,
    options: Arc<OptionsStore>,
    socket: Arc<dyn HostSocket>,
}

impl QuicDialer {
    pub(crate) fn new(
        mux: Arc<Multiplexer>,
        authority: Authority,
        path: Path,
        remote_addr: SocketAddr,
        socket: Arc<dyn HostSocket>,
    ) -> Self {
        Self {
            mux,
            authority,
            path,
            remote_addr,
            options: Arc::new(OptionsStore::new()),
            socket,
        }
    }

    fn session_key(&self) -> String {
        format!("dial:{}", self.authority)
    }

    pub async fn dial(&self) -> Result<Pipe, TransportError> {
        let key = self.session_key();

        // Step 1: load or create the session, already holding one ref
        // share for this call either way.
        let session = self
            .mux
            .load_or_create_session(&key, self.remote_addr, self.authority.host(), &self.options)
            .await?;

        // Step 2: open a bidirectional stream on it.
        let (mut send, mut recv) = match session.get().open_bi().await {
            Ok(pair) => pair,
            Err(e) => {
                self.mux.release_session(&key, &session).await;
                return Err(TransportError::DialFailed(std::io::Error::other(e)));
            }
        };

        // Step 3: negotiate the path.
        if let Err(e) = negotiator::text::dial_negotiate(&mut send, &mut recv, self.path.as_str()).await {
            self.mux.release_session(&key, &session).await;
            return Err(e);
        }

        // Step 4: install the one-shot release hook, then step 5: hand
        // back the pipe.
        let mux = Arc::clone(&self.mux);
        let session_for_hook = Arc::clone(&session);
        let on_close = move || {
            tokio::spawn(async move {
                mux.release_session(&key, &session_for_hook).await;
            });
        };

        Ok(Pipe::new(
            send,
            recv,
            self.socket.local_protocol(),
            self.socket.peer_protocol(),
            self.socket.max_recv_size(),
            self.remote_addr,
            on_close,
        ))
    }

    pub fn set_option(&self, name: &str, value: OptionValue) -> Result<(), TransportError> {
        self.options.set(name, value)
    }

    pub fn get_option(&self, name: &str) -> Result<OptionValue, TransportError> {
        self.options.get(name)
    }
}

#[async_trait]
impl crate::Dialer for QuicDialer {
    async fn dial(&self) -> Result<Pipe, TransportError> {
        QuicDialer::dial(self).await
    }

    fn set_option(&self, name: &str, value: OptionValue) -> Result<(), TransportError> {
        QuicDialer::set_option(self, name, value)
    }

    fn get_option(&self, name: &str) -> Result<OptionValue, TransportError> {
        QuicDialer::get_option(self, name)
    }
}
