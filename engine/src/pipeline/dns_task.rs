//! The DNS task: candidate resolution and blocklist filtering.
//!
//! Resolves each candidate against the fixed `[TXT, CNAME, A, AAAA]`
//! sequence, short-circuiting A/AAAA once a CNAME answer is seen, and drops
//! any query's entire answer set if it contains a blocklisted A record.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::model::{DNSAnswer, DNSRequest, RecordType};
use crate::resolver::SharedResolver;
use crate::stats::Stats;

const QUERY_SEQUENCE: [RecordType; 4] = [RecordType::Txt, RecordType::Cname, RecordType::A, RecordType::Aaaa];

/// Resolves `req` against the fixed query sequence, without regard to
/// passive/active mode. Callers decide whether to invoke this stage at all.
pub async fn resolve(resolver: &SharedResolver, config: &Config, mut req: DNSRequest) -> Option<DNSRequest> {
    let mut saw_cname = false;
    let mut records = Vec::new();

    for rtype in QUERY_SEQUENCE {
        if saw_cname && matches!(rtype, RecordType::A | RecordType::Aaaa) {
            continue;
        }
        let answers = match resolver.resolve(&req.name, rtype).await {
            Ok(answers) => answers,
            Err(e) => {
                log::debug!("dns task: {rtype} lookup for {} failed: {e}", req.name);
                continue;
            }
        };
        if answers.is_empty() {
            continue;
        }
        if rtype == RecordType::Cname {
            saw_cname = true;
        }
        if query_is_blocklisted(config, &answers) {
            continue;
        }
        records.extend(answers);
    }

    req.records = records;

    if req.records.is_empty() {
        if config.include_unresolvable && req.is_in_scope() {
            return Some(req);
        }
        return None;
    }
    Some(req)
}

fn query_is_blocklisted(config: &Config, answers: &[DNSAnswer]) -> bool {
    answers.iter().any(|a| {
        a.rtype == RecordType::A
            && IpAddr::from_str(&a.data)
                .map(|ip| config.ip_blocked(ip))
                .unwrap_or(false)
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    resolver: SharedResolver,
    config: Arc<Config>,
    stats: Arc<Stats>,
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

        match resolve(&resolver, &config, req).await {
            Some(resolved) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = tx.send(resolved) => if res.is_err() { break; },
                }
            }
            None => stats.retire(),
        }
    }
}
