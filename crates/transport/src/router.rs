//! Path routing table (§4.A). A freshly negotiated stream is handed to
//! whichever listener registered the negotiated path; this is a flat
//! equality lookup rather than a true radix tree, per the spec's own note
//! that the conceptual "radix-tree-shaped" table collapses to a hash map
//! when paths are compared for exact equality only.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use quic_mux_types::TransportError;

use crate::multiplexer::NegotiatedStream;

/// The channel a listener registers so the router can hand it freshly
/// negotiated streams. Capacity 1 approximates the unbuffered channel the
/// spec calls for — tokio's `mpsc` has no true zero-capacity variant, so
/// this is the closest rendezvous-like stand-in.
pub type PathSender = mpsc::Sender<NegotiatedStream>;

/// Path -> channel table, one entry per currently-listening path on a
/// given authority. Lookups are frequent (once per inbound stream) and
/// never cross an `.await`, so a synchronous reader-writer lock is the
/// right tool — this is the one table in the crate that doesn't need
/// `tokio::sync::RwLock`.
pub struct PathRouter {
    table: RwLock<HashMap<String, PathSender>>,
}

impl PathRouter {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Register `path`. Fails with [`TransportError::DuplicatePath`] if
    /// another listener already occupies it (§8 invariant 4/5).
    pub fn register(&self, path: &str, sender: PathSender) -> Result<(), TransportError> {
        let mut table = self.table.write();
        if table.contains_key(path) {
            return Err(TransportError::DuplicatePath(path.to_string()));
        }
        table.insert(path.to_string(), sender);
        Ok(())
    }

    /// Look up the channel registered for `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<PathSender> {
        self.table.read().get(path).cloned()
    }

    /// Remove `path`'s registration, e.g. when its listener closes.
    pub fn unregister(&self, path: &str) {
        self.table.write().remove(path);
    }

    #[cfg(test)]
    pub fn is_registered(&self, path: &str) -> bool {
        self.table.read().contains_key(path)
    }
}

impl Default for PathRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> PathSender {
        mpsc::channel(1).0
    }

    #[test]
    fn register_then_lookup_succeeds() {
        let router = PathRouter::new();
        router.register("/pair", sender()).unwrap();
        assert!(router.lookup("/pair").is_some());
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let router = PathRouter::new();
        router.register("/pair", sender()).unwrap();
        let err = router.register("/pair", sender()).unwrap_err();
        assert!(matches!(err, TransportError::DuplicatePath(p) if p == "/pair"));
    }

    #[test]
    fn unregister_frees_the_path_for_reuse() {
        let router = PathRouter::new();
        router.register("/pair", sender()).unwrap();
        router.unregister("/pair");
        assert!(router.lookup("/pair").is_none());
        router.register("/pair", sender()).unwrap();
    }

    #[test]
    fn distinct_paths_on_same_authority_coexist() {
        let router = PathRouter::new();
        router.register("/a", sender()).unwrap();
        router.register("/b", sender()).unwrap();
        assert!(router.lookup("/a").is_some());
        assert!(router.lookup("/b").is_some());
    }
}
