//! Socket options store (component J, §4.J, §6). Recognizes exactly the
//! keys the spec names: `QUIC-TLS-CONFIG`, `QUIC-UDP-CONFIG`, and the
//! supplemented `AcceptTimeout` (§9, drawn from the original `quic.go`).
//! `MaxRecvSize` is deliberately absent here — the spec attributes it to
//! the host socket, not this store, so it's read through [`crate::HostSocket`]
//! instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use quic_mux_types::TransportError;

use crate::tls;

pub const QUIC_TLS_CONFIG: &str = "QUIC-TLS-CONFIG";
pub const QUIC_UDP_CONFIG: &str = "QUIC-UDP-CONFIG";
pub const ACCEPT_TIMEOUT: &str = "AcceptTimeout";

/// A value recognized by [`OptionsStore`]. Kept as one enum (rather than
/// `Box<dyn Any>`) since the recognized key set is small and fixed.
#[derive(Clone)]
pub enum OptionValue {
    TlsServer(Arc<quinn::ServerConfig>),
    TlsClient(Arc<quinn::ClientConfig>),
    QuicTransport(Arc<quinn::TransportConfig>),
    AcceptTimeout(Duration),
}

fn recognize(name: &str) -> Result<&'static str, TransportError> {
    match name {
        QUIC_TLS_CONFIG => Ok(QUIC_TLS_CONFIG),
        QUIC_UDP_CONFIG => Ok(QUIC_UDP_CONFIG),
        ACCEPT_TIMEOUT => Ok(ACCEPT_TIMEOUT),
        other => Err(TransportError::BadOption(other.to_string())),
    }
}

/// Holds whatever options a dialer or listener has had set. Reads are far
/// more frequent than writes (one read per dial/listen call versus a
/// handful of writes at setup time), hence the reader-writer lock.
pub struct OptionsStore {
    table: RwLock<HashMap<&'static str, OptionValue>>,
}

impl OptionsStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, name: &str, value: OptionValue) -> Result<(), TransportError> {
        let key = recognize(name)?;
        match (key, &value) {
            (QUIC_TLS_CONFIG, OptionValue::TlsServer(_) | OptionValue::TlsClient(_)) => {}
            (QUIC_UDP_CONFIG, OptionValue::QuicTransport(_)) => {}
            (ACCEPT_TIMEOUT, OptionValue::AcceptTimeout(_)) => {}
            _ => return Err(TransportError::BadOption(format!("{name}: wrong value type"))),
        }
        self.table.write().insert(key, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<OptionValue, TransportError> {
        let key = recognize(name)?;
        self.table
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| TransportError::BadOption(name.to_string()))
    }

    pub fn accept_timeout(&self) -> Option<Duration> {
        match self.table.read().get(ACCEPT_TIMEOUT) {
            Some(OptionValue::AcceptTimeout(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn transport_config(&self) -> Option<Arc<quinn::TransportConfig>> {
        match self.table.read().get(QUIC_UDP_CONFIG) {
            Some(OptionValue::QuicTransport(cfg)) => Some(Arc::clone(cfg)),
            _ => None,
        }
    }

    /// The server-side QUIC config to bind a listener with: whatever was
    /// set via `QUIC-TLS-CONFIG`, or a fresh self-signed default.
    pub fn server_quic_config(&self) -> Result<quinn::ServerConfig, TransportError> {
        let mut cfg = match self.table.read().get(QUIC_TLS_CONFIG) {
            Some(OptionValue::TlsServer(cfg)) => (**cfg).clone(),
            _ => tls::default_server_config()?,
        };
        if let Some(transport) = self.transport_config() {
            cfg.transport_config(transport);
        }
        Ok(cfg)
    }

    /// The client-side QUIC config to dial with: whatever was set via
    /// `QUIC-TLS-CONFIG`, or the default that skips certificate
    /// verification.
    pub fn client_quic_config(&self) -> Result<quinn::ClientConfig, TransportError> {
        let mut cfg = match self.table.read().get(QUIC_TLS_CONFIG) {
            Some(OptionValue::TlsClient(cfg)) => (**cfg).clone(),
            _ => tls::default_client_config()?,
        };
        if let Some(transport) = self.transport_config() {
            cfg.transport_config(transport);
        }
        Ok(cfg)
    }
}

impl Default for OptionsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_key_is_rejected() {
        let store = OptionsStore::new();
        let err = store.get("bogus").unwrap_err();
        assert!(matches!(err, TransportError::BadOption(_)));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let store = OptionsStore::new();
        let err = store
            .set(QUIC_TLS_CONFIG, OptionValue::AcceptTimeout(Duration::from_secs(1)))
            .unwrap_err();
        assert!(matches!(err, TransportError::BadOption(_)));
    }

    #[test]
    fn accept_timeout_round_trips() {
        let store = OptionsStore::new();
        assert!(store.accept_timeout().is_none());
        store
            .set(ACCEPT_TIMEOUT, OptionValue::AcceptTimeout(Duration::from_millis(250)))
            .unwrap();
        assert_eq!(store.accept_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn unset_tls_config_falls_back_to_defaults() {
        let store = OptionsStore::new();
        store.server_quic_config().unwrap();
        store.client_quic_config().unwrap();
    }
}
