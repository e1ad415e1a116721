//! Core data model: the records that flow through the enumeration pipeline.
//!
//! `DNSRequest` is the unit of work for the whole pipeline. `ASNRequest`
//! is the seed type consumed only by the source dispatcher. `Event` scopes
//! everything persisted by the data manager to one enumeration run.

use std::fmt;

/// Maximum length of a fully-qualified domain name, in octets, per RFC 1035.
pub const MAX_FQDN_LEN: usize = 253;

/// An IANA DNS resource record type, carried as its numeric value.
///
/// Only the subset referenced by the pipeline gets a named constant; any other
/// value round-trips through `RecordType::Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Ns,
    Mx,
    Soa,
    Srv,
    Spf,
    Ptr,
    Other(u16),
}

impl RecordType {
    pub fn code(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Ptr => 12,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Spf => 99,
            RecordType::Other(c) => c,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Ns => "NS",
            RecordType::Mx => "MX",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Spf => "SPF",
            RecordType::Ptr => "PTR",
            RecordType::Other(c) => return write!(f, "TYPE{}", c),
        };
        f.write_str(name)
    }
}

/// A single resolved answer for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DNSAnswer {
    pub name: String,
    pub rtype: RecordType,
    pub ttl: u32,
    pub data: String,
}

impl DNSAnswer {
    pub fn new(name: impl Into<String>, rtype: RecordType, ttl: u32, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rtype,
            ttl,
            data: data.into(),
        }
    }
}

/// Origin classification of a `DNSRequest`.
///
/// Trusted tags (see `Config::trusted_tags`) bypass wildcard filtering during
/// validation because their provenance (e.g. certificate transparency) already
/// rules out wildcard pollution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Dns,
    Cert,
    Scrape,
    Api,
    Archive,
    External,
    Other(String),
}

impl Tag {
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Dns => "dns",
            Tag::Cert => "cert",
            Tag::Scrape => "scrape",
            Tag::Api => "api",
            Tag::Archive => "archive",
            Tag::External => "external",
            Tag::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate or resolved name moving through the pipeline.
///
/// Ownership is exclusive along the pipeline; a request is cloned only when
/// it must be duplicated for parallel dispatch to the source dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DNSRequest {
    pub name: String,
    pub domain: String,
    pub tag: Tag,
    pub source: String,
    pub records: Vec<DNSAnswer>,
}

impl DNSRequest {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, tag: Tag, source: impl Into<String>) -> Self {
        Self {
            name: Self::normalize(name),
            domain: domain.into(),
            tag,
            source: source.into(),
            records: Vec::new(),
        }
    }

    /// Trims the trailing root dot and lower-cases. Public so callers that
    /// build node identity from raw answer data (not through `DNSRequest::new`)
    /// can apply the exact same normalization, keeping node identity
    /// consistent regardless of which path a name entered through.
    pub fn normalize(name: impl Into<String>) -> String {
        name.into().trim_end_matches('.').to_ascii_lowercase()
    }

    /// Structural validity: non-empty, within the RFC 1035 length bound.
    pub fn is_well_formed(&self) -> bool {
        !self.name.is_empty() && self.name.len() <= MAX_FQDN_LEN
    }

    /// Case-insensitive suffix match of `name` against `domain`.
    pub fn in_scope_of(name: &str, domain: &str) -> bool {
        if domain.is_empty() {
            return false;
        }
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        name == domain || name.ends_with(&format!(".{domain}"))
    }

    pub fn is_in_scope(&self) -> bool {
        Self::in_scope_of(&self.name, &self.domain)
    }
}

/// A seed consumed only by the source dispatcher; never re-enters the name
/// source directly. See `DESIGN.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ASNRequest {
    pub asn: u32,
}

impl ASNRequest {
    pub fn new(asn: u32) -> Self {
        Self { asn }
    }
}

/// A seed element broadcast by the source dispatcher to every data source.
#[derive(Debug, Clone)]
pub enum Seed {
    Name(DNSRequest),
    Asn(ASNRequest),
}

/// Opaque identifier grouping all results of one enumeration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event(pub u128);

impl Event {
    pub fn new(id: u128) -> Self {
        Self(id)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_dot_and_case() {
        let req = DNSRequest::new("WWW.Example.COM.", "example.com", Tag::Dns, "test");
        assert_eq!(req.name, "www.example.com");
    }

    #[test]
    fn scope_suffix_match_is_case_insensitive() {
        assert!(DNSRequest::in_scope_of("FOO.example.com", "example.com"));
        assert!(DNSRequest::in_scope_of("example.com", "example.com"));
        assert!(!DNSRequest::in_scope_of("notexample.com", "example.com"));
        assert!(!DNSRequest::in_scope_of("foo.example.com", ""));
    }

    #[test]
    fn well_formed_rejects_empty_and_oversized() {
        let mut req = DNSRequest::new("", "example.com", Tag::Dns, "test");
        assert!(!req.is_well_formed());
        req.name = "a".repeat(254);
        assert!(!req.is_well_formed());
        req.name = "a".repeat(253);
        assert!(req.is_well_formed());
    }
}
