//! The "basic queries" bundle shared by the root task and the subdomain
//! task: NS, MX, SOA, SPF queries against a name, synthesized into a new
//! `DNSRequest` when at least one answer comes back.

use crate::model::{DNSRequest, RecordType, Tag};
use crate::resolver::SharedResolver;

const BUNDLE_TYPES: [RecordType; 4] = [RecordType::Ns, RecordType::Mx, RecordType::Soa, RecordType::Spf];

/// Runs the NS/MX/SOA/SPF bundle against `name`. Resolver errors are logged
/// and treated as empty. Returns `None` if every query came back empty.
pub async fn basic_queries_bundle(resolver: &SharedResolver, name: &str, domain: &str) -> Option<DNSRequest> {
    let mut records = Vec::new();
    for rtype in BUNDLE_TYPES {
        match resolver.resolve(name, rtype).await {
            Ok(answers) => records.extend(answers),
            Err(e) => log::debug!("basic queries bundle: {rtype} lookup for {name} failed: {e}"),
        }
    }
    if records.is_empty() {
        return None;
    }
    let mut req = DNSRequest::new(name, domain, Tag::Dns, "Forward DNS");
    req.records = records;
    Some(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::model::DNSAnswer;
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::Arc;

    struct StubResolver;

    #[async_trait]
    impl crate::resolver::Resolver for StubResolver {
        async fn resolve(&self, name: &str, rtype: RecordType) -> Result<Vec<DNSAnswer>, EngineError> {
            if rtype == RecordType::Ns {
                Ok(vec![DNSAnswer::new(name, rtype, 300, "ns1.example.com")])
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
    async fn bundle_synthesizes_request_when_any_answer_found() {
        let resolver: SharedResolver = Arc::new(StubResolver);
        let req = basic_queries_bundle(&resolver, "example.com", "example.com").await.unwrap();
        assert_eq!(req.records.len(), 1);
        assert_eq!(req.source, "Forward DNS");
    }
}
