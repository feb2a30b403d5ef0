//! Static-website origin endpoints by region
//!
//! Plain lookup data used when describing the origin of a distribution.

/// Website endpoint and hosted zone for a storage region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebsiteEndpoint {
    pub endpoint: &'static str,
    pub hosted_zone_id: &'static str,
}

const ENDPOINTS: &[(&str, WebsiteEndpoint)] = &[
    ("us-east-1", WebsiteEndpoint { endpoint: "s3-website-us-east-1.amazonaws.com", hosted_zone_id: "Z3AQBSTGFYJSTF" }),
    ("us-east-2", WebsiteEndpoint { endpoint: "s3-website.us-east-2.amazonaws.com", hosted_zone_id: "Z2O1EMRO9K5GLX" }),
    ("us-west-1", WebsiteEndpoint { endpoint: "s3-website-us-west-1.amazonaws.com", hosted_zone_id: "Z2F56UZL2M1ACD" }),
    ("us-west-2", WebsiteEndpoint { endpoint: "s3-website-us-west-2.amazonaws.com", hosted_zone_id: "Z3BJ6K6RIION7M" }),
    ("ca-central-1", WebsiteEndpoint { endpoint: "s3-website.ca-central-1.amazonaws.com", hosted_zone_id: "Z1QDHH18159H29" }),
    ("eu-west-1", WebsiteEndpoint { endpoint: "s3-website-eu-west-1.amazonaws.com", hosted_zone_id: "Z1BKCTXD74EZPE" }),
    ("eu-west-2", WebsiteEndpoint { endpoint: "s3-website.eu-west-2.amazonaws.com", hosted_zone_id: "Z3GKZC51ZF0DB4" }),
    ("eu-central-1", WebsiteEndpoint { endpoint: "s3-website.eu-central-1.amazonaws.com", hosted_zone_id: "Z21DNDUVLTQW6Q" }),
    ("ap-south-1", WebsiteEndpoint { endpoint: "s3-website.ap-south-1.amazonaws.com", hosted_zone_id: "Z11RGJOFQNVJUP" }),
    ("ap-northeast-1", WebsiteEndpoint { endpoint: "s3-website-ap-northeast-1.amazonaws.com", hosted_zone_id: "Z2M4EHUR26P7ZW" }),
    ("ap-northeast-2", WebsiteEndpoint { endpoint: "s3-website.ap-northeast-2.amazonaws.com", hosted_zone_id: "Z3W03O7B5YMIYP" }),
    ("ap-southeast-1", WebsiteEndpoint { endpoint: "s3-website-ap-southeast-1.amazonaws.com", hosted_zone_id: "Z3O0J2DXBE1FTB" }),
    ("ap-southeast-2", WebsiteEndpoint { endpoint: "s3-website-ap-southeast-2.amazonaws.com", hosted_zone_id: "Z1WCIGYICN2BYD" }),
    ("sa-east-1", WebsiteEndpoint { endpoint: "s3-website-sa-east-1.amazonaws.com", hosted_zone_id: "Z7KQH4QJS55SO" }),
];

/// Looks up the website endpoint for `region`
pub fn website_endpoint(region: &str) -> Option<WebsiteEndpoint> {
    ENDPOINTS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, endpoint)| *endpoint)
}

/// Origin domain of a bucket-backed website in `region`
pub fn origin_domain(bucket: &str, region: &str) -> Option<String> {
    website_endpoint(region).map(|endpoint| format!("{}.{}", bucket, endpoint.endpoint))
}
