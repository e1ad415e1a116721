//! The source dispatcher: fan-out with per-source serialization.
//!
//! Fans seeds out to every configured `DataSource`, one per-source worker
//! task serializing that source's own queue so "at most one in-flight
//! request per source" and per-source FIFO fall out of the channel itself
//! rather than an explicit state machine: an unbounded `mpsc` per source
//! *is* the `Idle -> Busy -> Idle` / `Queued` state machine, with the
//! worker loop as the single coordinator that observes completion events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::model::{DNSRequest, Seed};
use crate::source::DataSource;

/// One source's queue plus its `Busy` flag, sampled by `pending()`.
struct SourceHandle {
    tx: mpsc::UnboundedSender<Seed>,
    busy: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Coordinates fan-out of `Seed` elements to every registered `DataSource`.
///
/// Construction spawns one worker task per source; `send_requests`
/// broadcasts a seed to all of them. Every source sees every seed
/// regardless of declared capability, modulo `DataSource::accepts`, which
/// is the source-level filter left as an extension point. Discoveries are
/// emitted to a single shared channel rather than threaded back through
/// `NameSource` directly, so the caller decides whether discoveries
/// re-enter admission filtering.
pub struct SourceDispatcher {
    sources: Vec<SourceHandle>,
}

impl SourceDispatcher {
    pub fn new(
        sources: Vec<Arc<dyn DataSource>>,
        emit: mpsc::UnboundedSender<DNSRequest>,
        cancel: CancelToken,
    ) -> Self {
        let handles = sources
            .into_iter()
            .map(|source| {
                let (tx, rx) = mpsc::unbounded_channel();
                let busy = Arc::new(AtomicBool::new(false));
                let join = tokio::spawn(worker(source, rx, emit.clone(), busy.clone(), cancel.clone()));
                SourceHandle { tx, busy, join }
            })
            .collect();
        Self { sources: handles }
    }

    /// Broadcasts `seed` to every source's queue. A source with a
    /// full-looking queue never blocks the caller: the per-source channel is
    /// unbounded, so back-pressure here is bounded only by how far behind a
    /// slow source's handler falls. The input is a non-blocking send target.
    pub fn send_requests(&self, seed: Seed) {
        for handle in &self.sources {
            let _ = handle.tx.send(seed.clone());
        }
    }

    /// True iff any source is currently processing a seed.
    pub fn pending(&self) -> bool {
        self.sources.iter().any(|h| h.busy.load(Ordering::SeqCst))
    }

    /// Drops every source's queue (unblocking its worker's `recv`) and waits
    /// for all workers to exit. Outstanding queued seeds are discarded, not
    /// processed.
    pub async fn shutdown(self) {
        for handle in self.sources {
            drop(handle.tx);
            let _ = handle.join.await;
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

async fn worker(
    source: Arc<dyn DataSource>,
    mut rx: mpsc::UnboundedReceiver<Seed>,
    emit: mpsc::UnboundedSender<DNSRequest>,
    busy: Arc<AtomicBool>,
    cancel: CancelToken,
) {
    loop {
        let seed = tokio::select! {
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(seed) => seed,
                None => break,
            },
        };

        if !source.accepts(&seed) {
            continue;
        }

        busy.store(true, Ordering::SeqCst);
        source.handle(seed, &emit).await;
        busy.store(false, Ordering::SeqCst);
    }
}
