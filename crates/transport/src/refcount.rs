//! Ref-counted handles (§4.B / §4.C). The spec treats listener and session
//! records as following an identical contract, so both are instances of
//! this one generic `Record<T>` rather than two hand-duplicated types.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// A ref-counted wrapper around a QUIC-level resource (an endpoint or a
/// connection) plus the means to close it. The count starts at 1 on
/// construction (the first holder is whoever called `Record::new`); every
/// additional holder must call [`Record::incr`], and every holder —
/// including the first — must eventually call [`Record::decr`] exactly
/// once.
pub struct Record<T> {
    inner: T,
    refcnt: AtomicI64,
    close_fn: Box<dyn Fn(&T) + Send + Sync>,
    done_tx: watch::Sender<bool>,
}

impl<T> Record<T> {
    /// Wrap `inner`, starting the ref count at 1. `close_fn` is invoked
    /// exactly once, when the count returns to zero.
    pub fn new(inner: T, close_fn: impl Fn(&T) + Send + Sync + 'static) -> Arc<Self> {
        let (done_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            inner,
            refcnt: AtomicI64::new(1),
            close_fn: Box::new(close_fn),
            done_tx,
        })
    }

    /// The wrapped resource.
    pub fn get(&self) -> &T {
        &self.inner
    }

    /// The current ref count. Exposed for tests asserting §8 invariants
    /// 2 and 3; production code should not branch on this value.
    pub fn refcount(&self) -> i64 {
        self.refcnt.load(Ordering::SeqCst)
    }

    /// Register an additional holder. Returns a clone of the `Arc` for
    /// convenience at call sites that immediately store it.
    pub fn incr(self: &Arc<Self>) -> Arc<Self> {
        self.refcnt.fetch_add(1, Ordering::SeqCst);
        Arc::clone(self)
    }

    /// Release this holder's share. Returns the count immediately after
    /// decrementing, so a caller that needs to react to a particular
    /// remaining count (e.g. "only the accept loop's own share is left")
    /// can do so without a separate, racy read of [`Record::refcount`].
    /// Most callers only care whether this reached zero, in which case
    /// the caller is responsible for calling [`Record::close`] and
    /// removing the record from whichever multiplexer table holds it —
    /// removal and closing must happen under the same critical section
    /// (§3).
    ///
    /// Decrementing past zero is a programming error: the spec requires
    /// this to panic rather than silently saturate (§4.B/C, §8 invariant
    /// 10).
    #[track_caller]
    pub fn decr(self: &Arc<Self>) -> i64 {
        let prev = self.refcnt.fetch_sub(1, Ordering::SeqCst);
        if prev <= 0 {
            panic!("ref count decremented below zero — caller double-released a record");
        }
        prev - 1
    }

    /// Close the wrapped resource and publish the done-signal. Call this
    /// only after [`Record::decr`] returned `0`.
    pub fn close(&self) {
        (self.close_fn)(&self.inner);
        let _ = self.done_tx.send(true);
    }

    /// Subscribe to the done-signal. A subscriber that arrives after the
    /// record was already closed observes `true` immediately.
    pub fn subscribe_done(&self) -> watch::Receiver<bool> {
        self.done_tx.subscribe()
    }

    /// Wait for the record to be closed.
    pub async fn wait_done(&self) {
        let mut rx = self.subscribe_done();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn starts_at_one() {
        let r = Record::new(42, |_| {});
        assert_eq!(r.refcount(), 1);
    }

    #[test]
    fn incr_and_decr_balance() {
        let closed = Arc::new(AtomicBool::new(false));
        let closed2 = Arc::clone(&closed);
        let r = Record::new((), move |_| closed2.store(true, Ordering::SeqCst));

        let r2 = r.incr();
        assert_eq!(r.refcount(), 2);

        assert_eq!(r2.decr(), 1);
        assert!(!closed.load(Ordering::SeqCst));

        assert_eq!(r.decr(), 0);
        r.close();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "double-released")]
    fn overclose_panics() {
        let r = Record::new((), |_| {});
        assert_eq!(r.decr(), 0);
        r.decr();
    }

    #[tokio::test]
    async fn done_signal_fires_at_close() {
        let r = Record::new((), |_| {});
        let mut rx = r.subscribe_done();
        assert!(!*rx.borrow());

        assert_eq!(r.decr(), 0);
        r.close();

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn late_subscriber_sees_already_closed() {
        let r = Record::new((), |_| {});
        assert_eq!(r.decr(), 0);
        r.close();

        // wait_done must not hang for a subscriber arriving after close.
        r.wait_done().await;
    }
}
