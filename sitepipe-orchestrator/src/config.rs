//! Orchestrator configuration
//!
//! Reads every option from environment variables and validates the result
//! before anything starts. A configuration that fails validation aborts
//! startup.

use sitepipe_core::config::SiteConfig;
use sitepipe_core::domain::binding::{Certificate, DomainBinding};
use sitepipe_core::domain::cache::{EdgeConfig, ViewerProtocolPolicy};
use sitepipe_core::dto::site::SiteDescription;
use sitepipe_core::error::{ConfigError, ConfigResult};
use sitepipe_core::region;
use sitepipe_runner::{BuildProfile, ComputeProfile};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::service::PublishSettings;

/// Where revisions are checked out from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Local working copy, copied per build
    Directory(PathBuf),
    /// Remote git repository, cloned per build
    Repository(String),
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub certificate: Certificate,

    pub source: SourceLocation,
    /// Parent of the per-run build workspaces
    pub workspace_dir: PathBuf,
    /// Artifact store root; artifacts stay in memory when unset
    pub artifact_dir: Option<PathBuf>,
    /// Published set root; content stays in memory when unset
    pub publish_dir: Option<PathBuf>,

    pub build: BuildProfile,
    pub publish: PublishSettings,
    pub cancel_stale_builds: bool,

    pub control_addr: String,
    pub edge_addr: String,
    /// Hostname DNS alias records point at
    pub edge_endpoint: String,
    pub region: String,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Required:
    /// - SITE_DOMAIN_NAME
    /// - SITE_CERTIFICATE_ARN
    ///
    /// Optional:
    /// - SITE_CERTIFICATE_NAMES (comma list, default: `<domain>,*.<domain>`)
    /// - SITE_DEFAULT_TTL / SITE_MIN_TTL (seconds, default: 30 / 5)
    /// - TRACKED_BRANCH (default: master)
    /// - VIEWER_PROTOCOL_POLICY (redirect-to-https | allow-all)
    /// - SOURCE_REPOSITORY (git URL) or SOURCE_DIR (default: .)
    /// - WORKSPACE_DIR, ARTIFACT_DIR, PUBLISH_DIR
    /// - BUILD_INSTALL, BUILD_COMPILE, BUILD_VALIDATE (`;`-separated commands)
    /// - BUILD_ENV (comma list of KEY=VALUE)
    /// - BUILD_OUTPUT_DIR (default: public)
    /// - BUILD_TIMEOUT (seconds, default: 900)
    /// - BUILD_COMPUTE (small | medium | large)
    /// - PUBLISH_OP_TIMEOUT (seconds, default: 10)
    /// - PUBLISH_MAX_RETRIES (attempts per file, default: 4)
    /// - CANCEL_STALE_BUILDS (default: false)
    /// - CONTROL_BIND_ADDR (default: 0.0.0.0:8080)
    /// - EDGE_BIND_ADDR (default: 0.0.0.0:8443)
    /// - EDGE_ENDPOINT (default: localhost)
    /// - AWS_REGION (default: us-east-1)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let domain_name = var("SITE_DOMAIN_NAME").ok_or(ConfigError::Missing("SITE_DOMAIN_NAME"))?;
        let certificate_arn =
            var("SITE_CERTIFICATE_ARN").ok_or(ConfigError::Missing("SITE_CERTIFICATE_ARN"))?;

        let mut site = SiteConfig::new(domain_name.clone(), certificate_arn.clone());
        if let Some(ttl) = parse::<u64>("SITE_DEFAULT_TTL", var("SITE_DEFAULT_TTL"))? {
            site.default_ttl = ttl;
        }
        if let Some(ttl) = parse::<u64>("SITE_MIN_TTL", var("SITE_MIN_TTL"))? {
            site.min_ttl = ttl;
        }
        if let Some(branch) = var("TRACKED_BRANCH") {
            site.tracked_branch = branch;
        }
        if let Some(policy) = var("VIEWER_PROTOCOL_POLICY") {
            site.viewer_protocol_policy = ViewerProtocolPolicy::from_str(&policy)?;
        }

        let subject_names = match var("SITE_CERTIFICATE_NAMES") {
            Some(names) => split_list(&names, ','),
            None => vec![domain_name.clone(), format!("*.{}", domain_name)],
        };
        let certificate = Certificate::new(certificate_arn, subject_names);

        let source = match var("SOURCE_REPOSITORY") {
            Some(url) => SourceLocation::Repository(url),
            None => SourceLocation::Directory(var("SOURCE_DIR").unwrap_or_else(|| ".".into()).into()),
        };

        let mut build = BuildProfile {
            install: split_list(&var("BUILD_INSTALL").unwrap_or_default(), ';'),
            compile: split_list(&var("BUILD_COMPILE").unwrap_or_default(), ';'),
            validate: split_list(&var("BUILD_VALIDATE").unwrap_or_default(), ';'),
            env_vars: parse_env_vars(var("BUILD_ENV").as_deref())?,
            ..BuildProfile::default()
        };
        if let Some(output_dir) = var("BUILD_OUTPUT_DIR") {
            build.output_dir = output_dir;
        }
        if let Some(secs) = parse::<u64>("BUILD_TIMEOUT", var("BUILD_TIMEOUT"))? {
            build.timeout = Duration::from_secs(secs);
        }
        if let Some(compute) = var("BUILD_COMPUTE") {
            build.compute = ComputeProfile::from_str(&compute)?;
        }

        let mut publish = PublishSettings::default();
        if let Some(secs) = parse::<u64>("PUBLISH_OP_TIMEOUT", var("PUBLISH_OP_TIMEOUT"))? {
            publish.op_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse::<u32>("PUBLISH_MAX_RETRIES", var("PUBLISH_MAX_RETRIES"))? {
            publish.max_attempts = attempts;
        }

        let cancel_stale_builds = match var("CANCEL_STALE_BUILDS") {
            Some(flag) => parse_bool("CANCEL_STALE_BUILDS", &flag)?,
            None => false,
        };

        Ok(Self {
            site,
            certificate,
            source,
            workspace_dir: var("WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("sitepipe-workspaces")),
            artifact_dir: var("ARTIFACT_DIR").map(PathBuf::from),
            publish_dir: var("PUBLISH_DIR").map(PathBuf::from),
            build,
            publish,
            cancel_stale_builds,
            control_addr: var("CONTROL_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            edge_addr: var("EDGE_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8443".into()),
            edge_endpoint: var("EDGE_ENDPOINT").unwrap_or_else(|| "localhost".into()),
            region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".into()),
        })
    }

    /// Validates every option
    pub fn validate(&self) -> ConfigResult<()> {
        self.binding()?;
        self.build.validate()?;

        if self.publish.op_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                option: "PUBLISH_OP_TIMEOUT",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.publish.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                option: "PUBLISH_MAX_RETRIES",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if region::website_endpoint(&self.region).is_none() {
            return Err(ConfigError::InvalidValue {
                option: "AWS_REGION",
                reason: format!("unknown region '{}'", self.region),
            });
        }

        Ok(())
    }

    /// Domain binding checked against the certificate
    pub fn binding(&self) -> ConfigResult<DomainBinding> {
        DomainBinding::new(&self.site, &self.certificate)
    }

    /// Description of the served site as exposed by the control API
    pub fn site_description(&self) -> ConfigResult<SiteDescription> {
        let binding = self.binding()?;
        let origin_id = region::origin_domain(&self.site.domain_name, &self.region)
            .unwrap_or_else(|| self.site.domain_name.clone());

        Ok(SiteDescription {
            dns_records: binding.dns_records(&self.edge_endpoint),
            edge: EdgeConfig {
                policy: self.site.cache_policy()?,
                origin_id,
                aliases: vec![binding.alias.clone()],
                viewer_protocol_policy: self.site.viewer_protocol_policy,
            },
            binding,
        })
    }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse<T: FromStr>(option: &'static str, value: Option<String>) -> ConfigResult<Option<T>> {
    value
        .map(|v| {
            v.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                option,
                reason: format!("'{}' is not a valid number", v),
            })
        })
        .transpose()
}

fn parse_bool(option: &'static str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            option,
            reason: format!("'{}' is not a boolean", other),
        }),
    }
}

fn parse_env_vars(value: Option<&str>) -> ConfigResult<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for pair in split_list(value.unwrap_or_default(), ',') {
        match pair.split_once('=') {
            Some((key, val)) if !key.trim().is_empty() => {
                vars.insert(key.trim().to_string(), val.to_string());
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    option: "BUILD_ENV",
                    reason: format!("expected KEY=VALUE, got '{}'", pair),
                });
            }
        }
    }
    Ok(vars)
}
