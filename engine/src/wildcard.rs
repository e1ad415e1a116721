//! Wildcard zone detection used by the validation stage.
//!
//! A zone is probed by resolving >=3 random labels under it; if they all
//! return the same non-empty answer set, the zone is marked a dynamic
//! wildcard and that answer set becomes its fingerprint. Classification is
//! cached per `(domain, rtype)` for the run and single-flighted so
//! concurrent first-seen probes for the same zone coalesce into one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::{Mutex, OnceCell};

use crate::model::RecordType;
use crate::resolver::SharedResolver;

const PROBE_COUNT: usize = 3;
const LABEL_LEN: usize = 14;

fn random_label() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LABEL_LEN)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}

type Fingerprint = HashSet<String>;
type Cell = Arc<OnceCell<Option<Fingerprint>>>;

pub struct WildcardDetector {
    resolver: SharedResolver,
    cache: Mutex<HashMap<(String, u16), Cell>>,
}

impl WildcardDetector {
    pub fn new(resolver: SharedResolver) -> Self {
        Self {
            resolver,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn cell_for(&self, domain: &str, rtype: RecordType) -> Cell {
        let mut guard = self.cache.lock().await;
        guard
            .entry((domain.to_ascii_lowercase(), rtype.code()))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// The zone's wildcard fingerprint for `rtype`, if it is a dynamic
    /// wildcard zone. Probes at most once per `(domain, rtype)` per run.
    pub async fn fingerprint(&self, domain: &str, rtype: RecordType) -> Option<Fingerprint> {
        let cell = self.cell_for(domain, rtype).await;
        cell.get_or_init(|| self.probe(domain.to_string(), rtype))
            .await
            .clone()
    }

    async fn probe(&self, domain: String, rtype: RecordType) -> Option<Fingerprint> {
        let mut fingerprint: Option<Fingerprint> = None;
        for _ in 0..PROBE_COUNT {
            let name = format!("{}.{}", random_label(), domain);
            let answers = match self.resolver.resolve(&name, rtype).await {
                Ok(answers) => answers,
                Err(e) => {
                    log::debug!("wildcard probe for {domain} ({rtype}) failed: {e}");
                    return None;
                }
            };
            if answers.is_empty() {
                return None;
            }
            let set: Fingerprint = answers.into_iter().map(|a| a.data).collect();
            match &fingerprint {
                None => fingerprint = Some(set),
                Some(existing) if existing == &set => {}
                Some(_) => return None,
            }
        }
        if fingerprint.is_some() {
            log::info!("{domain} is a dynamic wildcard zone for {rtype}");
        }
        fingerprint
    }

    /// Whether `answer_data` (the `.data` values of one request's records of
    /// this `rtype`) matches the zone's wildcard fingerprint.
    pub async fn is_wildcard_match(&self, domain: &str, rtype: RecordType, answer_data: &Fingerprint) -> bool {
        if answer_data.is_empty() {
            return false;
        }
        match self.fingerprint(domain, rtype).await {
            Some(fp) => &fp == answer_data,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DNSAnswer;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedResolver {
        calls: AtomicUsize,
        answer: Option<DNSAnswer>,
    }

    #[async_trait]
    impl crate::resolver::Resolver for FixedResolver {
        async fn resolve(&self, name: &str, rtype: RecordType) -> Result<Vec<DNSAnswer>, crate::error::EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match &self.answer {
                Some(a) => vec![DNSAnswer::new(name, rtype, a.ttl, a.data.clone())],
                None => vec![],
            })
        }
        async fn reverse(&self, _ip: IpAddr) -> Result<Option<DNSAnswer>, crate::error::EngineError> {
            Ok(None)
        }
        async fn zone_transfer(
            &self,
            _subdomain: &str,
            _domain: &str,
            _server: &str,
        ) -> Result<Vec<crate::model::DNSRequest>, crate::error::EngineError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn detects_dynamic_wildcard_zone() {
        let resolver = Arc::new(FixedResolver {
            calls: AtomicUsize::new(0),
            answer: Some(DNSAnswer::new("probe", RecordType::A, 60, "10.0.0.1")),
        });
        let detector = WildcardDetector::new(resolver.clone());

        let fingerprint = detector.fingerprint("wild.example.com", RecordType::A).await;
        assert!(fingerprint.is_some());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), PROBE_COUNT);

        let matching: Fingerprint = ["10.0.0.1".to_string()].into_iter().collect();
        assert!(detector.is_wildcard_match("wild.example.com", RecordType::A, &matching).await);

        // single-flighted: re-querying the same zone/rtype does not re-probe
        let _ = detector.fingerprint("wild.example.com", RecordType::A).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), PROBE_COUNT);
    }

    #[tokio::test]
    async fn non_wildcard_zone_has_no_fingerprint() {
        let resolver = Arc::new(FixedResolver {
            calls: AtomicUsize::new(0),
            answer: None,
        });
        let detector = WildcardDetector::new(resolver);
        assert!(detector.fingerprint("normal.example.com", RecordType::A).await.is_none());
    }
}
