//! The validation task: trusted re-resolution plus wildcard suppression.
//!
//! Re-resolves each candidate (same query sequence and blocklist as the DNS
//! task, but against the trusted resolver pool) and drops requests whose
//! answers match their zone's wildcard fingerprint, unless the request's
//! `Tag` is trusted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::model::{DNSRequest, RecordType};
use crate::pipeline::dns_task;
use crate::resolver::SharedResolver;
use crate::stats::Stats;
use crate::wildcard::WildcardDetector;

/// Re-resolves `req` and applies wildcard suppression. Returns `None` if the
/// request should be dropped.
pub async fn validate(
    resolver: &SharedResolver,
    config: &Config,
    wildcard: &WildcardDetector,
    req: DNSRequest,
) -> Option<DNSRequest> {
    let trusted = config.is_trusted_tag(&req.tag);
    let req = dns_task::resolve(resolver, config, req).await?;

    if trusted {
        return Some(req);
    }

    let mut by_type: HashMap<RecordType, std::collections::HashSet<String>> = HashMap::new();
    for answer in &req.records {
        by_type.entry(answer.rtype).or_default().insert(answer.data.clone());
    }

    for (rtype, data) in &by_type {
        if wildcard.is_wildcard_match(&req.domain, *rtype, data).await {
            log::info!("{} dropped: matches {} wildcard fingerprint for {}", req.name, rtype, req.domain);
            return None;
        }
    }

    Some(req)
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    resolver: SharedResolver,
    config: Arc<Config>,
    wildcard: Arc<WildcardDetector>,
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

        match validate(&resolver, &config, &wildcard, req).await {
            Some(validated) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = tx.send(validated) => if res.is_err() { break; },
                }
            }
            None => stats.retire(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::model::{DNSAnswer, Tag};
    use async_trait::async_trait;
    use std::net::IpAddr;

    struct FixedResolver {
        a: &'static str,
    }

    #[async_trait]
    impl crate::resolver::Resolver for FixedResolver {
        async fn resolve(&self, name: &str, rtype: RecordType) -> Result<Vec<DNSAnswer>, EngineError> {
            Ok(match rtype {
                RecordType::A => vec![DNSAnswer::new(name, rtype, 60, self.a)],
                _ => vec![],
            })
        }
        async fn reverse(&self, _ip: IpAddr) -> Result<Option<DNSAnswer>, EngineError> {
            Ok(None)
        }
        async fn zone_transfer(
            &self,
            _subdomain: &str,
            _domain: &str,
            _server: &str,
        ) -> Result<Vec<DNSRequest>, EngineError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn untrusted_request_matching_wildcard_fingerprint_is_dropped() {
        let resolver: SharedResolver = Arc::new(FixedResolver { a: "10.0.0.1" });
        let config = Config::new(vec!["wild.example.com".into()]);
        let wildcard = WildcardDetector::new(resolver.clone());

        let req = DNSRequest::new("random.wild.example.com", "wild.example.com", Tag::Dns, "test");
        let result = validate(&resolver, &config, &wildcard, req).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn trusted_tag_bypasses_wildcard_filtering() {
        let resolver: SharedResolver = Arc::new(FixedResolver { a: "10.0.0.1" });
        let config = Config::new(vec!["wild.example.com".into()]);
        let wildcard = WildcardDetector::new(resolver.clone());

        let req = DNSRequest::new("random.wild.example.com", "wild.example.com", Tag::Cert, "test");
        let result = validate(&resolver, &config, &wildcard, req).await;
        assert!(result.is_some());
    }
}
