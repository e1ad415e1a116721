//! The data manager: graph persistence and derivation.
//!
//! Persists each validated request into the graph, derives new FQDN
//! candidates from record targets, and schedules reverse-DNS sweeps for any
//! A/AAAA answers. The "stop only after in-flight upserts finish" guarantee
//! falls out for free here: upserts are awaited synchronously inside the
//! loop, so joining this stage's task handle after its input channel closes
//! *is* that stop signal; there is no detached upsert work that could
//! outlive the loop.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use ipnetwork::IpNetwork;
use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::graph::{NodeKind, SharedGraph};
use crate::model::{DNSRequest, Event, RecordType};
use crate::pipeline::name_source::NameSource;
use crate::stats::Stats;

const FQDN_TARGET_TYPES: [RecordType; 5] = [
    RecordType::Cname,
    RecordType::Ns,
    RecordType::Mx,
    RecordType::Soa,
    RecordType::Srv,
];

/// Persists `req` and returns the FQDNs to derive plus the address-record
/// networks to sweep; the caller re-injects derivations and forwards the
/// request to the subdomain task.
async fn persist(
    graph: &SharedGraph,
    config: &Config,
    event: Event,
    req: &DNSRequest,
) -> (Vec<DNSRequest>, Vec<IpNetwork>) {
    if let Err(e) = graph.upsert_fqdn(&req.name, &req.source, event).await {
        log::warn!("data manager: upsert of {} failed: {e}", req.name);
    }

    let mut derived = Vec::new();
    let mut networks = Vec::new();

    for answer in &req.records {
        // hickory hands back target names with a trailing root dot and
        // original case (e.g. `ns1.example.com.`); normalize before node
        // construction so this lines up with the same host reaching
        // `upsert_fqdn` via a `DNSRequest`, which normalizes at `DNSRequest::new`.
        let data = DNSRequest::normalize(answer.data.clone());
        match answer.rtype {
            RecordType::A | RecordType::Aaaa => {
                if let Err(e) = graph
                    .upsert_node(NodeKind::IpAddress(data.clone()), &req.source, event)
                    .await
                {
                    log::warn!("data manager: upsert of IP {data} failed: {e}");
                }
                if let Ok(ip) = IpAddr::from_str(&data) {
                    if let Some(net) = containing_network(ip, config.active) {
                        networks.push(net);
                    }
                }
            }
            rtype if FQDN_TARGET_TYPES.contains(&rtype) => {
                if let Err(e) = graph
                    .upsert_node(NodeKind::Fqdn(data.clone()), &req.source, event)
                    .await
                {
                    log::warn!("data manager: upsert of target {data} failed: {e}");
                }
                if config.is_domain_in_scope(&data) {
                    derived.push(DNSRequest::new(
                        data.clone(),
                        config.which_domain(&data),
                        crate::model::Tag::Dns,
                        req.source.clone(),
                    ));
                }
            }
            _ => {}
        }
    }

    (derived, networks)
}

fn containing_network(ip: IpAddr, active: bool) -> Option<IpNetwork> {
    let prefix = match (ip, active) {
        (IpAddr::V4(_), true) => 23,
        (IpAddr::V4(_), false) => 24,
        (IpAddr::V6(_), true) => 119,
        (IpAddr::V6(_), false) => 120,
    };
    let rough = IpNetwork::new(ip, prefix).ok()?;
    IpNetwork::new(rough.network(), prefix).ok()
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    graph: SharedGraph,
    config: Arc<Config>,
    event: Event,
    name_source: Arc<NameSource>,
    stats: Arc<Stats>,
    cancel: CancelToken,
    mut rx: mpsc::Receiver<DNSRequest>,
    tx: mpsc::Sender<DNSRequest>,
    reverse_tx: mpsc::UnboundedSender<IpNetwork>,
) {
    for domain in &config.domains {
        graph.record_domain(event, domain).await;
    }

    loop {
        let req = tokio::select! {
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(req) => req,
                None => break,
            },
        };

        let (derived, networks) = persist(&graph, &config, event, &req).await;

        for d in derived {
            name_source.new_name(d, &config, &stats).await;
        }
        for net in networks {
            let _ = reverse_tx.send(net);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            res = tx.send(req) => if res.is_err() { break; },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraph;
    use crate::model::{DNSAnswer, Tag};

    #[tokio::test]
    async fn persists_fqdn_and_derives_cname_target() {
        let graph = Arc::new(InMemoryGraph::new());
        let config = Config::new(vec!["example.com".into()]);
        let event = Event::new(1);

        let mut req = DNSRequest::new("www.example.com", "example.com", Tag::Dns, "Forward DNS");
        req.records = vec![DNSAnswer::new("www.example.com", RecordType::Cname, 300, "cdn.example.com")];

        let graph_dyn: SharedGraph = graph.clone();
        let (derived, networks) = persist(&graph_dyn, &config, event, &req).await;
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].name, "cdn.example.com");
        assert!(networks.is_empty());

        let names = graph.event_fqdns(event).await;
        assert!(names.contains(&"www.example.com".to_string()));
    }

    #[tokio::test]
    async fn cname_target_node_identity_matches_its_normalized_derived_request() {
        let graph = Arc::new(InMemoryGraph::new());
        let config = Config::new(vec!["example.com".into()]);
        let event = Event::new(1);

        let mut req = DNSRequest::new("www.example.com", "example.com", Tag::Dns, "Forward DNS");
        req.records = vec![DNSAnswer::new("www.example.com", RecordType::Cname, 300, "CDN.Example.Com.")];

        let graph_dyn: SharedGraph = graph.clone();
        let (derived, _) = persist(&graph_dyn, &config, event, &req).await;
        assert_eq!(derived[0].name, "cdn.example.com");

        let _ = persist(&graph_dyn, &config, event, &derived[0]).await;

        let names = graph.event_fqdns(event).await;
        assert_eq!(names.iter().filter(|n| *n == "cdn.example.com").count(), 1);
    }

    #[tokio::test]
    async fn a_record_schedules_containing_network_sweep() {
        let graph: SharedGraph = Arc::new(InMemoryGraph::new());
        let config = Config::new(vec!["example.com".into()]);
        let event = Event::new(1);

        let mut req = DNSRequest::new("x.example.com", "example.com", Tag::Dns, "Forward DNS");
        req.records = vec![DNSAnswer::new("x.example.com", RecordType::A, 300, "93.184.216.34")];

        let (_, networks) = persist(&graph, &config, event, &req).await;
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].prefix(), 24);
    }
}
