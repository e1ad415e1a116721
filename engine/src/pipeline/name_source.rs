//! The name source: single entry point for every candidate name.
//!
//! The single entry point for every candidate name, whether it is a
//! configured root, a user-provided name, a data-source discovery, or a
//! derived name fed back from the root task, data manager, or subdomain
//! task. Applies the three-tier admission filter and hands admitted
//! requests to `next()` one at a time.

use tokio::sync::{mpsc, Mutex};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::dedup::DedupSet;
use crate::model::DNSRequest;
use crate::stats::Stats;

/// Admits candidates, deduplicates on `lower(Name)`, and streams them out
/// through an unbounded channel. `stop()` signals `stopped` so that any
/// waiter parked in `next()` unblocks immediately; already-queued items are
/// still drained first because `next()`'s select is biased toward `recv()`.
pub struct NameSource {
    tx: mpsc::UnboundedSender<DNSRequest>,
    rx: Mutex<mpsc::UnboundedReceiver<DNSRequest>>,
    seen: DedupSet,
    stopped: CancelToken,
}

impl NameSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            seen: DedupSet::new(),
            stopped: CancelToken::new(),
        }
    }

    /// A cloneable sender usable by downstream stages to re-inject derived
    /// requests without holding a reference to the `NameSource` itself.
    pub fn sender(&self) -> mpsc::UnboundedSender<DNSRequest> {
        self.tx.clone()
    }

    /// Admit a candidate through a silent three-tier filter: malformed,
    /// out-of-scope (after resolving `Domain` against `config` if unset), or
    /// already-seen names are dropped without error. A name-based blacklist
    /// check is folded into the first tier: a blacklisted name is treated as
    /// malformed for admission purposes.
    pub async fn new_name(&self, mut req: DNSRequest, config: &Config, stats: &Stats) {
        if !req.is_well_formed() || config.blacklisted(&req.name) {
            return;
        }
        if req.domain.is_empty() {
            req.domain = config.which_domain(&req.name);
        }
        if req.domain.is_empty() {
            return;
        }
        if !self.seen.insert_if_absent(&req.name).await {
            return;
        }
        stats.admit();
        if self.tx.send(req).is_err() {
            // Receiver already closed (post-stop); undo the admission count.
            stats.retire();
        }
    }

    /// Pulls the next admitted request, waiting for one to arrive. Returns
    /// `None` once the source has been stopped and fully drained.
    ///
    /// `recv()` is raced against `stopped` with the select biased toward
    /// `recv()`: a buffered item is always handed out before the stop signal
    /// is observed, but once the queue is empty a concurrent `stop()` wakes
    /// this call immediately rather than leaving it parked forever.
    pub async fn next(&self) -> Option<DNSRequest> {
        let mut guard = self.rx.lock().await;
        tokio::select! {
            biased;
            item = guard.recv() => item,
            _ = self.stopped.cancelled() => None,
        }
    }

    /// Idempotent. Does not touch the receiver lock: an earlier version
    /// closed the receiver directly here, which meant `stop()` and a
    /// parked `next()` contended for the same `Mutex`, and since `next()`
    /// only gives it up once `recv()` resolves, the two could deadlock at
    /// quiescence. Signaling `stopped` instead unblocks `next()` without
    /// needing that lock at all.
    pub async fn stop(&self) {
        self.stopped.cancel();
    }

    pub async fn seen_count(&self) -> usize {
        self.seen.len().await
    }
}

impl Default for NameSource {
    fn default() -> Self {
        Self::new()
    }
}
