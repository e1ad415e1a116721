//! The root task: first-stage per-root priming.
//!
//! Runs the basic-queries bundle exactly once per distinct root `Domain`
//! seen this run, the first time any request carrying that domain reaches
//! this stage, then forwards the original request unchanged. Dedup is keyed
//! on `Domain` rather than `Name`: the name source already guarantees every
//! `Name` this stage sees is new, so a second dedup gate on `Name` would be
//! a no-op. The first-writer-wins tie-break only has teeth when two
//! distinct names under the same root race to be first.
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::dedup::DedupSet;
use crate::model::DNSRequest;
use crate::pipeline::bundle::basic_queries_bundle;
use crate::pipeline::name_source::NameSource;
use crate::resolver::SharedResolver;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    resolver: SharedResolver,
    config: Arc<Config>,
    name_source: Arc<NameSource>,
    stats: Arc<crate::stats::Stats>,
    primed_roots: Arc<DedupSet>,
    cancel: CancelToken,
    mut rx: mpsc::Receiver<DNSRequest>,
    tx: mpsc::Sender<DNSRequest>,
) {
    loop {
        let req = tokio::select! {
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(req) => req,
                None => break,
            },
        };

        if primed_roots.insert_if_absent(&req.domain).await {
            if let Some(bundle_req) = basic_queries_bundle(&resolver, &req.domain, &req.domain).await {
                name_source.new_name(bundle_req, &config, &stats).await;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            res = tx.send(req) => if res.is_err() { break; },
        }
    }
}
