//! The `Graph` external collaborator.
//!
//! The concrete database is explicitly out of scope for the pipeline core;
//! `InMemoryGraph` exists so the crate is runnable end-to-end and so property
//! tests don't need network access to a real store. It is guarded by a
//! single `tokio::sync::Mutex`, the same way an in-memory accumulator
//! elsewhere in this workspace guards its shared state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::model::Event;

/// A graph node: an FQDN, an IP address, a netblock (CIDR) or an ASN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Fqdn(String),
    IpAddress(String),
    Netblock(String),
    Asn(u32),
}

/// `UpsertFQDN`, `EventsInScope`, `EventFQDNs`, `NodeSources`.
///
/// Upserts are idempotent for the same `(node, source, event)` triple.
/// Implementations must be safe for concurrent upserts; only `Stop` needs to
/// serialize with in-flight upserts.
#[async_trait]
pub trait Graph: Send + Sync {
    async fn upsert_fqdn(
        &self,
        name: &str,
        source: &str,
        event: Event,
    ) -> Result<NodeKind, EngineError>;

    async fn upsert_node(
        &self,
        node: NodeKind,
        source: &str,
        event: Event,
    ) -> Result<(), EngineError>;

    async fn events_in_scope(&self, domains: &[String]) -> Vec<Event>;

    async fn event_fqdns(&self, event: Event) -> Vec<String>;

    async fn node_sources(&self, node: &NodeKind, event: Event) -> Vec<String>;

    /// Associates `domain` with `event` so `events_in_scope` can find it
    /// later. A bookkeeping hook so a real graph implementation can index
    /// events by the domains they touched. No-op by default.
    async fn record_domain(&self, _event: Event, _domain: &str) {}
}

pub type SharedGraph = Arc<dyn Graph>;

#[derive(Default)]
struct Inner {
    /// (node, event) -> set of sources that have upserted it.
    edges: HashMap<(NodeKind, Event), HashSet<String>>,
    /// event -> domains observed under it, used by `events_in_scope`.
    event_domains: HashMap<Event, HashSet<String>>,
}

/// Dependency-free reference `Graph` implementation backed by an in-process
/// map, guarded by a single mutex, safe for concurrent upserts.
pub struct InMemoryGraph {
    inner: Mutex<Inner>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Graph for InMemoryGraph {
    async fn upsert_fqdn(
        &self,
        name: &str,
        source: &str,
        event: Event,
    ) -> Result<NodeKind, EngineError> {
        let node = NodeKind::Fqdn(name.to_string());
        self.upsert_node(node.clone(), source, event).await?;
        Ok(node)
    }

    async fn upsert_node(
        &self,
        node: NodeKind,
        source: &str,
        event: Event,
    ) -> Result<(), EngineError> {
        let mut guard = self.inner.lock().await;
        guard
            .edges
            .entry((node, event))
            .or_default()
            .insert(source.to_string());
        Ok(())
    }

    async fn events_in_scope(&self, domains: &[String]) -> Vec<Event> {
        let guard = self.inner.lock().await;
        guard
            .event_domains
            .iter()
            .filter(|(_, ds)| domains.iter().any(|d| ds.contains(d)))
            .map(|(e, _)| *e)
            .collect()
    }

    async fn event_fqdns(&self, event: Event) -> Vec<String> {
        let guard = self.inner.lock().await;
        guard
            .edges
            .keys()
            .filter(|(_, e)| *e == event)
            .filter_map(|(node, _)| match node {
                NodeKind::Fqdn(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    async fn node_sources(&self, node: &NodeKind, event: Event) -> Vec<String> {
        let guard = self.inner.lock().await;
        guard
            .edges
            .get(&(node.clone(), event))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn record_domain(&self, event: Event, domain: &str) {
        let mut guard = self.inner.lock().await;
        guard.event_domains.entry(event).or_default().insert(domain.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_is_idempotent_per_source_and_event() {
        let graph = InMemoryGraph::new();
        let event = Event::new(1);
        graph.upsert_fqdn("www.example.com", "Forward DNS", event).await.unwrap();
        graph.upsert_fqdn("www.example.com", "Forward DNS", event).await.unwrap();

        let node = NodeKind::Fqdn("www.example.com".to_string());
        let sources = graph.node_sources(&node, event).await;
        assert_eq!(sources, vec!["Forward DNS".to_string()]);
    }

    #[tokio::test]
    async fn event_fqdns_only_returns_fqdn_nodes() {
        let graph = InMemoryGraph::new();
        let event = Event::new(1);
        graph.upsert_fqdn("example.com", "DNS", event).await.unwrap();
        graph
            .upsert_node(NodeKind::IpAddress("93.184.216.34".into()), "DNS", event)
            .await
            .unwrap();

        let names = graph.event_fqdns(event).await;
        assert_eq!(names, vec!["example.com".to_string()]);
    }
}
