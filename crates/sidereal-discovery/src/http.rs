//! Registry URL and cache header helpers shared by the lookup and announcement clients.

use reqwest::header::{HeaderMap, CACHE_CONTROL, ETAG};
use std::time::Duration;
use url::Url;

use crate::error::{DiscoveryError, Result};

/// Parse the registry base URL, rejecting URLs that cannot carry a path.
pub(crate) fn parse_base_url(uri: &str) -> Result<Url> {
    let url = Url::parse(uri)
        .map_err(|e| DiscoveryError::config(format!("invalid registry uri {uri:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(DiscoveryError::config(format!(
            "registry uri {uri:?} cannot be used as a base"
        )));
    }
    Ok(url)
}

/// Append percent-encoded path segments to the registry base URL.
pub(crate) fn registry_url(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// `max-age` from a `Cache-Control` header, if present and well formed.
pub(crate) fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_max_age_directive)
}

fn parse_max_age_directive(directive: &str) -> Option<Duration> {
    let (name, value) = directive.trim().split_once('=')?;
    if !name.trim().eq_ignore_ascii_case("max-age") {
        return None;
    }
    value
        .trim()
        .trim_matches('"')
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// The `ETag` header value.
pub(crate) fn etag(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
