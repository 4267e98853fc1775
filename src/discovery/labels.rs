//! The container label contract: which labels opt a container in to scraping
//! and which ones tune the resulting target.
use std::collections::{BTreeMap, HashMap};

/// Opts a container in when set to [`SCRAPE_ENABLED_VALUE`].
pub const SCRAPE_ENABLED: &str = "prometheus.io/scrape";
pub const SCRAPE_ENABLED_VALUE: &str = "true";
/// Overrides the scrape port.
pub const PORT: &str = "prometheus.io/port";
/// Overrides the scrape address when the preferred network is not attached.
pub const IP: &str = "prometheus.io/ip";
/// Sets `__metrics_path__`.
pub const PATH: &str = "prometheus.io/path";
/// Sets `__scheme__`.
pub const SCHEME: &str = "prometheus.io/scheme";
/// Comma separated `key:value` pairs added to the target labels.
pub const EXTRA_LABELS: &str = "prometheus.io/extra-labels";

pub const META_CONTAINER_ID: &str = "__meta_container_id";
pub const META_CONTAINER_NAME: &str = "__meta_container_name";
pub const METRICS_PATH_LABEL: &str = "__metrics_path__";
pub const SCHEME_LABEL: &str = "__scheme__";

/// The `key=value` filter that selects opted-in containers in a listing.
pub fn scrape_enabled_filter() -> String {
    format!("{}={}", SCRAPE_ENABLED, SCRAPE_ENABLED_VALUE)
}

/// Returns true if the labels opt the container in to scraping.
pub fn is_managed(labels: &HashMap<String, String>) -> bool {
    labels.get(SCRAPE_ENABLED).map(String::as_str) == Some(SCRAPE_ENABLED_VALUE)
}

/// Returns the value of `key` unless it is missing or empty.
pub fn non_empty<'a>(labels: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    labels
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Parses `k1:v1,k2:v2,...`.
///
/// Everything after the first `:` belongs to the value, so values may contain
/// colons. A pair without `:` maps to an empty value. Empty pairs are ignored
/// and later duplicates overwrite earlier ones.
///
/// # Examples
///
/// ```
/// # use docker_labels_discovery::discovery::labels::parse_cs_labels;
/// let labels = parse_cs_labels("env:prod,url:http://x:1,flag");
/// assert_eq!(labels["env"], "prod");
/// assert_eq!(labels["url"], "http://x:1");
/// assert_eq!(labels["flag"], "");
/// ```
pub fn parse_cs_labels(src: &str) -> BTreeMap<String, String> {
    src.split(',')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_is_managed_requires_exact_value() {
        assert!(is_managed(&labels(&[(SCRAPE_ENABLED, "true")])));
        assert!(!is_managed(&labels(&[(SCRAPE_ENABLED, "True")])));
        assert!(!is_managed(&labels(&[(SCRAPE_ENABLED, "yes")])));
        assert!(!is_managed(&labels(&[(SCRAPE_ENABLED, "")])));
        assert!(!is_managed(&labels(&[("other", "true")])));
    }

    #[test]
    fn test_parse_cs_labels_empty() {
        assert!(parse_cs_labels("").is_empty());
        assert!(parse_cs_labels(",,").is_empty());
    }

    #[test]
    fn test_parse_cs_labels_malformed_pair_has_empty_value() {
        let parsed = parse_cs_labels("team:core,orphan");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["team"], "core");
        assert_eq!(parsed["orphan"], "");
    }

    #[test]
    fn test_parse_cs_labels_later_pair_wins() {
        let parsed = parse_cs_labels("env:dev,env:prod");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["env"], "prod");
    }

    #[test]
    fn test_non_empty() {
        let l = labels(&[(PORT, ""), (IP, "10.1.2.3")]);
        assert_eq!(non_empty(&l, PORT), None);
        assert_eq!(non_empty(&l, IP), Some("10.1.2.3"));
        assert_eq!(non_empty(&l, PATH), None);
    }
}
