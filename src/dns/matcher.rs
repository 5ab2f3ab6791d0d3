//! Decides whether a provider record belongs to a configured hostname.
//!
//! Name.com returns dot-terminated FQDNs, including `example.com.` for the
//! bare domain, while the configured domain is written without the dot. Both
//! sides are normalized before comparing, and the comparison ignores ASCII
//! case like DNS itself does.

use crate::config::DomainConfig;

/// Returns true if `fqdn` names one of the hostnames configured for the domain.
pub fn matches(config: &DomainConfig, fqdn: &str) -> bool {
    matching_hostname(config, fqdn).is_some()
}

/// Returns the configured hostname that `fqdn` corresponds to.
pub fn matching_hostname<'a>(config: &'a DomainConfig, fqdn: &str) -> Option<&'a str> {
    let fqdn = normalize(fqdn);
    let domain = normalize(&config.domain);

    config
        .hostnames
        .iter()
        .map(String::as_str)
        .find(|hostname| name_matches(hostname, domain, fqdn))
}

fn name_matches(hostname: &str, domain: &str, fqdn: &str) -> bool {
    if hostname.is_empty() {
        return fqdn.eq_ignore_ascii_case(domain);
    }

    // "<hostname>.<domain>" without allocating
    fqdn.len() == hostname.len() + 1 + domain.len()
        && fqdn.is_char_boundary(hostname.len())
        && fqdn[..hostname.len()].eq_ignore_ascii_case(hostname)
        && fqdn.as_bytes()[hostname.len()] == b'.'
        && fqdn[hostname.len() + 1..].eq_ignore_ascii_case(domain)
}

fn normalize(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
