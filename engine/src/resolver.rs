//! The `Resolver` external collaborator.
//!
//! The pipeline only ever depends on this trait; a concrete implementation
//! (or a test double) is supplied by the caller, treating
//! `hickory_resolver::Resolver` as an injected capability rather than
//! something the pipeline constructs itself mid-stage.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use crate::error::EngineError;
use crate::model::{DNSAnswer, DNSRequest, RecordType};

/// `Resolve(name, rrtype) -> ([]DNSAnswer, error)`, `Reverse(ip) -> (ptr, error)`,
/// `ZoneTransfer(sub, domain, server) -> ([]DNSRequest, error)`.
///
/// Resolver errors are logged and treated as empty answers by the pipeline;
/// implementations should still return `Err` faithfully so the caller can
/// log it, rather than silently swallowing failures themselves.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, name: &str, rtype: RecordType) -> Result<Vec<DNSAnswer>, EngineError>;

    async fn reverse(&self, ip: IpAddr) -> Result<Option<DNSAnswer>, EngineError>;

    async fn zone_transfer(
        &self,
        subdomain: &str,
        domain: &str,
        server: &str,
    ) -> Result<Vec<DNSRequest>, EngineError>;
}

pub type SharedResolver = Arc<dyn Resolver>;

/// A minimal `hickory-resolver`-backed adapter.
///
/// This is intentionally thin: it is not a recursive resolver implementation
/// and `zone_transfer` is not implemented by `hickory-resolver`'s stub
/// resolver, so it degrades to an empty result with a logged warning rather
/// than performing AXFR/IXFR itself.
pub struct HickoryResolver {
    inner: hickory_resolver::TokioResolver,
}

impl HickoryResolver {
    /// Build a resolver using `hickory-resolver`'s default (public) nameservers.
    pub fn with_defaults() -> Self {
        let resolver = hickory_resolver::Resolver::builder_with_config(
            hickory_resolver::config::ResolverConfig::default(),
            hickory_resolver::name_server::TokioConnectionProvider::default(),
        )
        .build();
        Self { inner: resolver }
    }

    /// Build a resolver that queries a single, explicit nameserver. Used for
    /// the trusted resolver pool the validation stage runs against, which
    /// must be distinct from whatever resolver the DNS task uses.
    pub fn with_nameserver(addr: std::net::SocketAddr) -> Self {
        let mut cfg = hickory_resolver::config::ResolverConfig::new();
        cfg.add_name_server(hickory_resolver::config::NameServerConfig::new(
            addr,
            hickory_resolver::proto::xfer::Protocol::Udp,
        ));
        let resolver = hickory_resolver::Resolver::builder_with_config(
            cfg,
            hickory_resolver::name_server::TokioConnectionProvider::default(),
        )
        .build();
        Self { inner: resolver }
    }
}

#[async_trait]
impl Resolver for HickoryResolver {
    async fn resolve(&self, name: &str, rtype: RecordType) -> Result<Vec<DNSAnswer>, EngineError> {
        let answers = match rtype {
            RecordType::A => self
                .inner
                .ipv4_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|ip| DNSAnswer::new(name, RecordType::A, 0, ip.to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Aaaa => self
                .inner
                .ipv6_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|ip| DNSAnswer::new(name, RecordType::Aaaa, 0, ip.to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Cname => self
                .inner
                .lookup(name, hickory_resolver::proto::rr::RecordType::CNAME)
                .await
                .map(|lookup| {
                    lookup
                        .record_iter()
                        .filter_map(|r| match r.data() {
                            Some(hickory_resolver::proto::rr::RData::CNAME(cname)) => {
                                Some(DNSAnswer::new(name, RecordType::Cname, r.ttl(), cname.to_string()))
                            }
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Txt => self
                .inner
                .txt_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|txt| DNSAnswer::new(name, RecordType::Txt, 0, txt.to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Ns => self
                .inner
                .ns_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|ns| DNSAnswer::new(name, RecordType::Ns, 0, ns.to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Mx => self
                .inner
                .mx_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|mx| DNSAnswer::new(name, RecordType::Mx, 0, mx.exchange().to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Soa => self
                .inner
                .soa_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|soa| DNSAnswer::new(name, RecordType::Soa, 0, soa.mname().to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Srv => self
                .inner
                .srv_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|srv| DNSAnswer::new(name, RecordType::Srv, 0, srv.target().to_string()))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            // SPF's dedicated RR type (99) was deprecated by RFC 7208; in
            // practice every publisher puts the policy string in a TXT
            // record instead, so that's what gets queried here.
            RecordType::Spf => self
                .inner
                .txt_lookup(name)
                .await
                .map(|lookup| {
                    lookup
                        .iter()
                        .map(|txt| txt.to_string())
                        .filter(|txt| txt.starts_with("v=spf1"))
                        .map(|txt| DNSAnswer::new(name, RecordType::Spf, 0, txt))
                        .collect::<Vec<_>>()
                })
                .map_err(EngineError::from)?,
            RecordType::Ptr | RecordType::Other(_) => Vec::new(),
        };
        Ok(answers)
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Option<DNSAnswer>, EngineError> {
        let lookup = self.inner.reverse_lookup(ip).await.map_err(EngineError::from)?;
        Ok(lookup
            .iter()
            .next()
            .map(|name| DNSAnswer::new(ip.to_string(), RecordType::Ptr, 0, name.to_string())))
    }

    async fn zone_transfer(
        &self,
        subdomain: &str,
        _domain: &str,
        server: &str,
    ) -> Result<Vec<DNSRequest>, EngineError> {
        log::warn!(
            "zone transfer requested for {subdomain} against {server}, but this adapter does not implement AXFR/IXFR; returning no results"
        );
        Ok(Vec::new())
    }
}
