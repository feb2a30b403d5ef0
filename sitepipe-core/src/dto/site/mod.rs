//! Site description DTOs

use serde::{Deserialize, Serialize};

use crate::domain::binding::{DnsRecord, DomainBinding};
use crate::domain::cache::EdgeConfig;

/// How the site is bound and served
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDescription {
    pub binding: DomainBinding,
    pub edge: EdgeConfig,
    pub dns_records: Vec<DnsRecord>,
}
