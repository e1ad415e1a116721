//! The subdomain task: first-seen expansion and reverse sweeps.
//!
//! Terminal pipeline stage. Tracks subdomain multiplicity and, on the first
//! occurrence of a new subdomain, re-primes the basic-queries bundle, probes
//! a fixed catalogue of SRV service names, and (in active mode) attempts
//! zone transfers against each authoritative NS discovered for it. Also
//! drains the reverse-sweep queue populated by the data manager, resolving
//! PTR records across each scheduled network.

use std::net::IpAddr;
use std::sync::Arc;

use ipnetwork::IpNetwork;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::dedup::{DedupSet, MultiplicityCounter};
use crate::model::{DNSRequest, RecordType, Tag};
use crate::pipeline::bundle::basic_queries_bundle;
use crate::pipeline::name_source::NameSource;
use crate::resolver::SharedResolver;
use crate::srv_catalogue::SRV_SERVICES;
use crate::stats::Stats;

async fn probe_srv(resolver: &SharedResolver, name_source: &NameSource, config: &Config, stats: &Stats, subdomain: &str) {
    for service in SRV_SERVICES {
        let query = format!("{service}.{subdomain}");
        match resolver.resolve(&query, RecordType::Srv).await {
            Ok(answers) if !answers.is_empty() => {
                let mut req = DNSRequest::new(query, config.which_domain(subdomain), Tag::Dns, "Forward DNS");
                req.records = answers;
                name_source.new_name(req, config, stats).await;
            }
            Ok(_) => {}
            Err(e) => log::debug!("subdomain task: SRV probe {query} failed: {e}"),
        }
    }
}

async fn attempt_zone_transfers(
    resolver: &SharedResolver,
    name_source: &NameSource,
    config: &Config,
    stats: &Stats,
    xfr_seen: &DedupSet,
    subdomain: &str,
    domain: &str,
) {
    if !config.active {
        return;
    }
    let ns_records = match resolver.resolve(subdomain, RecordType::Ns).await {
        Ok(answers) => answers,
        Err(e) => {
            log::debug!("subdomain task: NS lookup for {subdomain} failed: {e}");
            return;
        }
    };
    for ns in ns_records {
        let key = format!("{subdomain}+{}", ns.data);
        if !xfr_seen.insert_if_absent(&key).await {
            continue;
        }
        match resolver.zone_transfer(subdomain, domain, &ns.data).await {
            Ok(results) => {
                for derived in results {
                    name_source.new_name(derived, config, stats).await;
                }
            }
            Err(e) => log::debug!("subdomain task: zone transfer {subdomain} via {} failed: {e}", ns.data),
        }
    }
}

async fn handle_new_subdomain(
    resolver: &SharedResolver,
    name_source: &NameSource,
    config: &Config,
    stats: &Stats,
    xfr_seen: &DedupSet,
    subdomain: &str,
    domain: &str,
) {
    if let Some(bundle_req) = basic_queries_bundle(resolver, subdomain, domain).await {
        name_source.new_name(bundle_req, config, stats).await;
    }
    probe_srv(resolver, name_source, config, stats, subdomain).await;
    attempt_zone_transfers(resolver, name_source, config, stats, xfr_seen, subdomain, domain).await;
}

/// Enumerates every host address in `net`. `ipnetwork`'s per-family network
/// types expose `.network()`/`.prefix()` rather than a combined iterator on
/// `IpNetwork` itself, so the address space is walked by hand here.
fn hosts(net: IpNetwork) -> Vec<IpAddr> {
    match net {
        IpNetwork::V4(n) => {
            let base = u32::from(n.network());
            let bits = 32 - n.prefix() as u32;
            let count: u64 = 1u64 << bits;
            (0..count)
                .map(|i| IpAddr::V4(std::net::Ipv4Addr::from(base.wrapping_add(i as u32))))
                .collect()
        }
        IpNetwork::V6(n) => {
            let base = u128::from(n.network());
            let bits = 128 - n.prefix() as u32;
            let count: u128 = 1u128 << bits;
            (0..count)
                .map(|i| IpAddr::V6(std::net::Ipv6Addr::from(base.wrapping_add(i))))
                .collect()
        }
    }
}

async fn sweep_network(resolver: &SharedResolver, name_source: &NameSource, config: &Config, stats: &Stats, net: IpNetwork) {
    for ip in hosts(net) {
        match resolver.reverse(ip).await {
            Ok(Some(answer)) => {
                if config.is_domain_in_scope(&answer.data) {
                    let req = DNSRequest::new(answer.data.clone(), config.which_domain(&answer.data), Tag::Dns, "Reverse DNS");
                    name_source.new_name(req, config, stats).await;
                }
            }
            Ok(None) => {}
            Err(e) => log::debug!("subdomain task: reverse lookup for {ip} failed: {e}"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    resolver: SharedResolver,
    config: Arc<Config>,
    name_source: Arc<NameSource>,
    stats: Arc<Stats>,
    subdomain_counts: Arc<MultiplicityCounter>,
    xfr_seen: Arc<DedupSet>,
    cancel: CancelToken,
    mut rx: mpsc::Receiver<DNSRequest>,
    mut reverse_rx: mpsc::UnboundedReceiver<IpNetwork>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(req) => {
                    if subdomain_counts.bump_and_check_first(&req.name).await {
                        handle_new_subdomain(&resolver, &name_source, &config, &stats, &xfr_seen, &req.name, &req.domain).await;
                    }
                    stats.retire();
                }
                None => break,
            },
            net = reverse_rx.recv() => match net {
                Some(net) => sweep_network(&resolver, &name_source, &config, &stats, net).await,
                None => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::model::DNSAnswer;
    use async_trait::async_trait;

    struct SrvResolver;

    #[async_trait]
    impl crate::resolver::Resolver for SrvResolver {
        async fn resolve(&self, name: &str, rtype: RecordType) -> Result<Vec<DNSAnswer>, EngineError> {
            if rtype == RecordType::Srv && name.starts_with("_ldap._tcp") {
                Ok(vec![DNSAnswer::new(name, rtype, 300, "dc1.api.example.com")])
            } else {
                Ok(vec![])
            }
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
    async fn first_seen_subdomain_triggers_srv_expansion() {
        let resolver: SharedResolver = Arc::new(SrvResolver);
        let name_source = Arc::new(NameSource::new());
        let config = Arc::new(Config::new(vec!["example.com".into()]));
        let stats = Arc::new(Stats::new());
        let xfr_seen = Arc::new(DedupSet::new());

        handle_new_subdomain(&resolver, &name_source, &config, &stats, &xfr_seen, "api.example.com", "example.com").await;

        let mut found_srv = false;
        for _ in 0..SRV_SERVICES.len() {
            if let Ok(req) = tokio::time::timeout(std::time::Duration::from_millis(10), name_source.next()).await {
                if req.map(|r| r.name.starts_with("_ldap._tcp")).unwrap_or(false) {
                    found_srv = true;
                    break;
                }
            }
        }
        assert!(found_srv);
    }

    #[tokio::test]
    async fn subdomain_multiplicity_fires_once() {
        let counter = MultiplicityCounter::new();
        assert!(counter.bump_and_check_first("api.example.com").await);
        assert!(!counter.bump_and_check_first("api.example.com").await);
    }
}
