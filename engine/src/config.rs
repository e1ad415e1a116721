//! Recognized configuration surface and scope/blocklist resolution.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::model::Tag;

/// Default bad-subnet blocklist: the usual non-routable / documentation
/// ranges that frequently show up as junk A-records behind load balancers
/// and CDNs answering with a placeholder address.
const DEFAULT_BLOCKLIST: &[&str] = &[
    "0.0.0.0/8",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "198.105.244.0/24",
    "198.105.254.0/24",
];

/// Trusted-tag set: origin classes whose provenance permits bypassing
/// wildcard filtering during validation. Driven from configuration, not
/// hard-coded, so it can be tuned without a code change.
fn default_trusted_tags() -> HashSet<String> {
    ["cert", "dns-authoritative"].iter().map(|s| s.to_string()).collect()
}

/// The recognized configuration surface, plus the bits needed to
/// run a real process: blocklist entries and the trusted-tag set.
#[derive(Debug, Clone)]
pub struct Config {
    pub passive: bool,
    pub active: bool,
    pub include_unresolvable: bool,
    pub domains: Vec<String>,
    pub asns: Vec<u32>,
    pub provided_names: Vec<String>,
    pub uuid: String,
    blocklist: Vec<IpNetwork>,
    trusted_tags: HashSet<String>,
    blacklisted_names: HashSet<String>,
}

impl Config {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            passive: false,
            active: false,
            include_unresolvable: false,
            domains,
            asns: Vec::new(),
            provided_names: Vec::new(),
            uuid: String::new(),
            blocklist: DEFAULT_BLOCKLIST
                .iter()
                .map(|s| s.parse().expect("default blocklist entries are valid CIDRs"))
                .collect(),
            trusted_tags: default_trusted_tags(),
            blacklisted_names: HashSet::new(),
        }
    }

    /// Validate the configuration. Fatal failures here are the only
    /// configuration-stage errors the engine raises.
    pub fn validate(&self) -> Result<(), crate::error::EngineError> {
        if self.domains.is_empty() {
            return Err(crate::error::EngineError::config(
                "at least one root domain must be configured",
            ));
        }
        for d in &self.domains {
            if d.trim().is_empty() {
                return Err(crate::error::EngineError::config("empty domain in configuration"));
            }
        }
        Ok(())
    }

    pub fn with_blocklist(mut self, entries: impl IntoIterator<Item = IpNetwork>) -> Self {
        self.blocklist.extend(entries);
        self
    }

    pub fn with_trusted_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.trusted_tags.extend(tags);
        self
    }

    pub fn with_blacklisted_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.blacklisted_names
            .extend(names.into_iter().map(|n| n.trim_end_matches('.').to_ascii_lowercase()));
        self
    }

    /// `WhichDomain(name)`: the configured root that `name` is in scope of,
    /// or `""` if none. Derived names with an empty domain must never be
    /// enqueued.
    pub fn which_domain(&self, name: &str) -> String {
        self.domains
            .iter()
            .filter(|d| crate::model::DNSRequest::in_scope_of(name, d))
            // prefer the longest (most specific) matching root
            .max_by_key(|d| d.len())
            .cloned()
            .unwrap_or_default()
    }

    /// `IsDomainInScope(name)`.
    pub fn is_domain_in_scope(&self, name: &str) -> bool {
        !self.which_domain(name).is_empty()
    }

    /// `Blacklisted(name)`: literal name-based blacklist (exact name or any
    /// subdomain of a blacklisted name), independent of the IP blocklist used
    /// for answer filtering. Empty by default; populated from configuration.
    pub fn blacklisted(&self, name: &str) -> bool {
        self.blacklisted_names
            .iter()
            .any(|entry| crate::model::DNSRequest::in_scope_of(name, entry))
    }

    /// Whether an IPv4/IPv6 address lies in the configured bad-subnet
    /// blocklist.
    pub fn ip_blocked(&self, ip: IpAddr) -> bool {
        self.blocklist.iter().any(|net| net.contains(ip))
    }

    /// Whether `tag` is a trusted tag (bypasses wildcard filtering).
    pub fn is_trusted_tag(&self, tag: &Tag) -> bool {
        self.trusted_tags.contains(tag.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn which_domain_picks_most_specific_root() {
        let cfg = Config::new(vec!["example.com".into(), "dev.example.com".into()]);
        assert_eq!(cfg.which_domain("api.dev.example.com"), "dev.example.com");
        assert_eq!(cfg.which_domain("api.example.com"), "example.com");
        assert_eq!(cfg.which_domain("other.org"), "");
    }

    #[test]
    fn validate_rejects_empty_domain_list() {
        let cfg = Config::new(vec![]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_blocklist_matches_documented_bad_ip() {
        let cfg = Config::new(vec!["example.com".into()]);
        assert!(cfg.ip_blocked("198.105.244.42".parse().unwrap()));
        assert!(!cfg.ip_blocked("93.184.216.34".parse().unwrap()));
    }

    #[test]
    fn trusted_tags_default_includes_cert() {
        let cfg = Config::new(vec!["example.com".into()]);
        assert!(cfg.is_trusted_tag(&Tag::Cert));
        assert!(!cfg.is_trusted_tag(&Tag::Dns));
    }
}
