//! Fixed catalogue of popular SRV service names probed by the subdomain task.

pub const SRV_SERVICES: &[&str] = &[
    "_ldap._tcp",
    "_kerberos._tcp",
    "_kerberos._udp",
    "_gc._tcp",
    "_sip._tcp",
    "_sip._udp",
    "_sips._tcp",
    "_xmpp-client._tcp",
    "_xmpp-server._tcp",
    "_caldav._tcp",
    "_carddav._tcp",
    "_autodiscover._tcp",
    "_imap._tcp",
    "_imaps._tcp",
    "_submission._tcp",
    "_ntp._udp",
];
