//! Host routing and redirects
//!
//! Decides from the request host and scheme whether the edge serves
//! content, redirects, or rejects the request. Stateless.

use sitepipe_core::domain::binding::DomainBinding;
use sitepipe_core::domain::cache::ViewerProtocolPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Serve published content for the canonical host
    Serve,
    /// Permanent redirect to `location`
    Redirect { location: String },
    /// The host is not bound to this distribution
    Misdirected,
}

/// Routes a request for `host` made over `scheme`
///
/// # Arguments
/// * `host` - Value of the `Host` header, possibly with a port
/// * `scheme` - `http` or `https` as seen by the viewer
/// * `path_and_query` - Request target, preserved in redirects
pub fn route(
    binding: &DomainBinding,
    policy: ViewerProtocolPolicy,
    host: &str,
    scheme: &str,
    path_and_query: &str,
) -> Route {
    let host = strip_port(host).to_ascii_lowercase();
    let secure = scheme.eq_ignore_ascii_case("https");

    if host == binding.alias {
        return Route::Redirect {
            location: canonical_url(binding, path_and_query),
        };
    }

    if host != binding.canonical {
        return Route::Misdirected;
    }

    match policy {
        ViewerProtocolPolicy::RedirectToHttps if !secure => Route::Redirect {
            location: canonical_url(binding, path_and_query),
        },
        _ => Route::Serve,
    }
}

fn canonical_url(binding: &DomainBinding, path_and_query: &str) -> String {
    let target = if path_and_query.starts_with('/') {
        path_and_query
    } else {
        "/"
    };
    format!("https://{}{}", binding.canonical, target)
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
