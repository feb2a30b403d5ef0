//! Domain binding types
//!
//! Ties the canonical hostname and its alias to one certificate and to the
//! DNS records that point both names at the edge distribution.

use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::error::{ConfigError, ConfigResult};

/// Hosted zone id used for alias records targeting an edge distribution
pub const EDGE_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// TLS certificate known to the deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub arn: String,
    /// Subject and alternative names, wildcards allowed in the first label
    pub subject_names: Vec<String>,
}

impl Certificate {
    pub fn new(arn: impl Into<String>, subject_names: Vec<String>) -> Self {
        Self {
            arn: arn.into(),
            subject_names,
        }
    }

    /// Whether any subject name matches `hostname`
    pub fn covers(&self, hostname: &str) -> bool {
        self.subject_names
            .iter()
            .any(|name| name_matches(name, hostname))
    }
}

fn name_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let hostname = hostname.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        // A wildcard covers exactly one label
        Some(suffix) => hostname
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == suffix),
        None => pattern == hostname,
    }
}

/// Canonical and alias hostnames served through the edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBinding {
    pub canonical: String,
    pub alias: String,
    pub certificate_arn: String,
}

impl DomainBinding {
    /// Binds the configured domain, checking the certificate covers both names
    pub fn new(config: &SiteConfig, certificate: &Certificate) -> ConfigResult<Self> {
        config.validate()?;

        if certificate.arn != config.certificate_arn {
            return Err(ConfigError::CertificateMismatch {
                arn: config.certificate_arn.clone(),
                hostname: config.domain_name.clone(),
            });
        }

        let canonical = config.domain_name.clone();
        let alias = config.alias_hostname();

        for hostname in [&canonical, &alias] {
            if !certificate.covers(hostname) {
                return Err(ConfigError::CertificateMismatch {
                    arn: certificate.arn.clone(),
                    hostname: hostname.clone(),
                });
            }
        }

        Ok(Self {
            canonical,
            alias,
            certificate_arn: certificate.arn.clone(),
        })
    }

    /// Alias records pointing both hostnames at `edge_endpoint`
    pub fn dns_records(&self, edge_endpoint: &str) -> Vec<DnsRecord> {
        let mut records = Vec::with_capacity(4);
        for hostname in [&self.canonical, &self.alias] {
            for record_type in [RecordType::A, RecordType::Aaaa] {
                records.push(DnsRecord {
                    name: hostname.clone(),
                    record_type,
                    alias_target: edge_endpoint.to_string(),
                    hosted_zone_id: EDGE_HOSTED_ZONE_ID.to_string(),
                });
            }
        }
        records
    }
}

/// Alias record in an authoritative DNS zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String,
    pub record_type: RecordType,
    pub alias_target: String,
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    A,
    Aaaa,
}
