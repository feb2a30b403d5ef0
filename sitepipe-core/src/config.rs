//! Site configuration
//!
//! The recognized configuration surface of a deployment and the rules it
//! must satisfy before a pipeline is allowed to start.

use serde::{Deserialize, Serialize};

use crate::domain::cache::{
    CachePolicy, DEFAULT_MIN_TTL_SECONDS, DEFAULT_TTL_SECONDS, ViewerProtocolPolicy,
};
use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_TRACKED_BRANCH: &str = "master";

/// Site-level configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub domain_name: String,
    pub certificate_arn: String,
    pub default_ttl: u64,
    pub min_ttl: u64,
    pub tracked_branch: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}

impl SiteConfig {
    /// Creates a configuration with default TTLs and branch
    pub fn new(domain_name: impl Into<String>, certificate_arn: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            certificate_arn: certificate_arn.into(),
            default_ttl: DEFAULT_TTL_SECONDS,
            min_ttl: DEFAULT_MIN_TTL_SECONDS,
            tracked_branch: DEFAULT_TRACKED_BRANCH.to_string(),
            viewer_protocol_policy: ViewerProtocolPolicy::default(),
        }
    }

    pub fn with_ttls(mut self, default_ttl: u64, min_ttl: u64) -> Self {
        self.default_ttl = default_ttl;
        self.min_ttl = min_ttl;
        self
    }

    /// Validates every option
    pub fn validate(&self) -> ConfigResult<()> {
        validate_domain_name(&self.domain_name)?;
        validate_certificate_arn(&self.certificate_arn)?;
        self.cache_policy()?;

        if self.tracked_branch.trim().is_empty() {
            return Err(ConfigError::Missing("trackedBranch"));
        }

        Ok(())
    }

    /// Cache policy derived from the TTL options
    pub fn cache_policy(&self) -> ConfigResult<CachePolicy> {
        CachePolicy::new(self.default_ttl, self.min_ttl)
    }

    /// Hostname that redirects to the canonical domain
    pub fn alias_hostname(&self) -> String {
        format!("www.{}", self.domain_name)
    }
}

/// Checks a domain name against the accepted hostname pattern
///
/// Lowercase letters, digits and dashes in dot-separated labels, 4 to 253
/// characters, ending in an alphabetic top-level domain.
pub fn validate_domain_name(domain: &str) -> ConfigResult<()> {
    let invalid = |reason: &str| {
        Err(ConfigError::InvalidDomain {
            domain: domain.to_string(),
            reason: reason.to_string(),
        })
    };

    if domain.is_empty() {
        return Err(ConfigError::Missing("domainName"));
    }
    if domain.len() < 4 || domain.len() > 253 {
        return invalid("length must be between 4 and 253 characters");
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return invalid("must contain a top-level domain");
    }

    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return invalid("labels must be 1 to 63 characters");
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return invalid("only lowercase letters, digits and dashes are allowed");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("labels must not start or end with a dash");
        }
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_lowercase()) {
        return invalid("top-level domain must be at least two letters");
    }

    Ok(())
}

/// Checks that a certificate reference looks like an ACM certificate ARN
pub fn validate_certificate_arn(arn: &str) -> ConfigResult<()> {
    if arn.trim().is_empty() {
        return Err(ConfigError::Missing("certificateArn"));
    }

    // arn:<partition>:acm:<region>:<account>:certificate/<id>
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    let well_formed = parts.len() == 6
        && parts[0] == "arn"
        && !parts[1].is_empty()
        && parts[2] == "acm"
        && !parts[3].is_empty()
        && !parts[4].is_empty()
        && parts[5]
            .strip_prefix("certificate/")
            .is_some_and(|id| !id.is_empty());

    if !well_formed {
        return Err(ConfigError::InvalidCertificate(arn.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:acm:us-east-1:123456789012:certificate/0f1e2d3c";

    #[test]
    fn test_defaults() {
        let config = SiteConfig::new("example.com", ARN);
        assert_eq!(config.default_ttl, 30);
        assert_eq!(config.min_ttl, 5);
        assert_eq!(config.tracked_branch, "master");
        assert!(config.validate().is_ok());
        assert_eq!(config.alias_hostname(), "www.example.com");
    }

    #[test]
    fn test_ttl_invariant_rejected() {
        let config = SiteConfig::new("example.com", ARN).with_ttls(30, 60);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TtlOrder {
                min_ttl: 60,
                default_ttl: 30
            })
        ));
    }

    #[test]
    fn test_domain_patterns() {
        for ok in ["example.com", "my-site.example.org", "a1.io", "sub.domain.co.uk"] {
            assert!(validate_domain_name(ok).is_ok(), "{ok} rejected");
        }
        for bad in [
            "localhost",
            "Example.com",
            "-bad.com",
            "bad-.com",
            "under_score.com",
            "example.c",
            "example.123",
            "a..com",
            "x.y",
        ] {
            assert!(validate_domain_name(bad).is_err(), "{bad} accepted");
        }
        assert_eq!(validate_domain_name(""), Err(ConfigError::Missing("domainName")));
        let long = format!("{}.com", "a".repeat(250));
        assert!(validate_domain_name(&long).is_err());
    }

    #[test]
    fn test_certificate_arn() {
        assert!(validate_certificate_arn(ARN).is_ok());
        assert_eq!(
            validate_certificate_arn(""),
            Err(ConfigError::Missing("certificateArn"))
        );
        for bad in [
            "not-an-arn",
            "arn:aws:iam::123456789012:role/x",
            "arn:aws:acm:us-east-1:123456789012:certificate/",
        ] {
            assert!(validate_certificate_arn(bad).is_err(), "{bad} accepted");
        }
    }
}
