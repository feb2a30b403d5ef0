//! Edge cache policy types

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_TTL_SECONDS: u64 = 30;
pub const DEFAULT_MIN_TTL_SECONDS: u64 = 5;

/// Time-to-live bounds for one edge distribution
///
/// Always satisfies `min_ttl <= default_ttl`; use [`CachePolicy::new`] to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCachePolicy")]
pub struct CachePolicy {
    default_ttl: u64,
    min_ttl: u64,
}

impl CachePolicy {
    pub fn new(default_ttl: u64, min_ttl: u64) -> ConfigResult<Self> {
        if min_ttl > default_ttl {
            return Err(ConfigError::TtlOrder {
                min_ttl,
                default_ttl,
            });
        }
        Ok(Self {
            default_ttl,
            min_ttl,
        })
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn min_ttl(&self) -> u64 {
        self.min_ttl
    }

    /// TTL an edge node applies to a response
    ///
    /// An explicit origin directive replaces the default, but the result is
    /// never below `min_ttl`.
    pub fn effective_ttl(&self, origin_max_age: Option<u64>) -> u64 {
        origin_max_age
            .unwrap_or(self.default_ttl)
            .max(self.min_ttl)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL_SECONDS,
            min_ttl: DEFAULT_MIN_TTL_SECONDS,
        }
    }
}

#[derive(Deserialize)]
struct RawCachePolicy {
    default_ttl: u64,
    min_ttl: u64,
}

impl TryFrom<RawCachePolicy> for CachePolicy {
    type Error = ConfigError;

    fn try_from(raw: RawCachePolicy) -> Result<Self, Self::Error> {
        CachePolicy::new(raw.default_ttl, raw.min_ttl)
    }
}

/// How the edge treats plain-HTTP viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    #[default]
    RedirectToHttps,
    AllowAll,
}

impl std::str::FromStr for ViewerProtocolPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redirect-to-https" => Ok(ViewerProtocolPolicy::RedirectToHttps),
            "allow-all" => Ok(ViewerProtocolPolicy::AllowAll),
            other => Err(ConfigError::InvalidValue {
                option: "viewerProtocolPolicy",
                reason: format!("unknown policy '{}'", other),
            }),
        }
    }
}

/// Edge distribution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub policy: CachePolicy,
    pub origin_id: String,
    pub aliases: Vec<String>,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}
