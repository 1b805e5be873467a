//! Leaf-certificate hostname verification.
//!
//! Matches the connection hostname against the leaf's SAN dNSName entries,
//! falling back to the subject CN only when the certificate carries no DNS
//! SANs. Wildcards cover exactly one leftmost label.

use rustls::pki_types::CertificateDer;
use tracing::debug;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::parse_x509_certificate;

/// Check whether the leaf certificate is issued for `hostname`.
///
/// Returns false for an unparseable certificate.
#[must_use]
pub fn verify_hostname(leaf: &CertificateDer<'_>, hostname: &str) -> bool {
    let Ok((_, cert)) = parse_x509_certificate(leaf.as_ref()) else {
        debug!(hostname, "leaf certificate failed to parse");
        return false;
    };

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        let mut saw_dns_name = false;
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                saw_dns_name = true;
                if matches_pattern(dns, hostname) {
                    return true;
                }
            }
        }
        // DNS SANs present but none matched: CN is not consulted.
        if saw_dns_name {
            return false;
        }
    }

    let cn_matches = cert
        .subject()
        .iter_common_name()
        .filter_map(|attr| attr.as_str().ok())
        .any(|cn| matches_pattern(cn, hostname));
    cn_matches
}

/// Case-insensitive DNS name match with leftmost-label-only wildcards.
///
/// `*.example.com` matches `a.example.com` but neither `example.com` nor
/// `a.b.example.com`.
#[must_use]
pub fn matches_pattern(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix("*.") {
        // The wildcard must consume exactly one non-empty label.
        match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        }
    } else {
        pattern == hostname
    }
}
