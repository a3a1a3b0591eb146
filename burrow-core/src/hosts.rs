use burrow_scanner::{ProbeResponse, host_key};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

#[derive(Debug, Clone)]
pub struct HostState {
    /// The first URL seen for this host.
    pub parsed_url: Url,
    /// Response to the canary probe, if one was made.
    pub baseline: Option<Arc<ProbeResponse>>,
}

/// Per-host state keyed by `host[:port]`.
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: RwLock<HashMap<String, HostState>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the host of `url`. An already-known host keeps its state.
    /// Returns `true` when the host was new.
    pub fn register_host(&self, url: &Url) -> bool {
        let key = host_key(url);
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        if hosts.contains_key(&key) {
            return false;
        }
        hosts.insert(
            key,
            HostState {
                parsed_url: url.clone(),
                baseline: None,
            },
        );
        true
    }

    pub fn host_known(&self, host: &str) -> bool {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(host)
    }

    /// Store the soft-404 baseline for `host`, registering it if needed.
    pub fn record_baseline(&self, host: &str, url: &Url, response: Arc<ProbeResponse>) {
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState {
                parsed_url: url.clone(),
                baseline: None,
            })
            .baseline = Some(response);
    }

    pub fn baseline(&self, host: &str) -> Option<Arc<ProbeResponse>> {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .and_then(|state| state.baseline.clone())
    }

    pub fn get(&self, host: &str) -> Option<HostState> {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use std::time::Duration;

    fn baseline_response() -> Arc<ProbeResponse> {
        Arc::new(ProbeResponse {
            method: "GET".to_string(),
            url: Url::parse("http://h:8080/canary").unwrap(),
            status_code: 404,
            headers: HeaderMap::new(),
            body: b"gone".to_vec(),
            response_time: Duration::ZERO,
        })
    }

    #[test]
    fn test_register_is_keyed_by_host_and_port() {
        let registry = HostRegistry::new();
        let url = Url::parse("http://h:8080/a").unwrap();
        assert!(registry.register_host(&url));
        assert!(!registry.register_host(&Url::parse("http://h:8080/other").unwrap()));
        assert!(registry.host_known("h:8080"));
        assert!(!registry.host_known("h"));
        assert_eq!(registry.get("h:8080").unwrap().parsed_url.path(), "/a");
    }

    #[test]
    fn test_baseline_roundtrip() {
        let registry = HostRegistry::new();
        let url = Url::parse("http://h:8080/").unwrap();
        registry.register_host(&url);
        assert!(registry.baseline("h:8080").is_none());

        registry.record_baseline("h:8080", &url, baseline_response());
        assert_eq!(registry.baseline("h:8080").unwrap().body, b"gone");
        assert!(registry.baseline("other").is_none());
    }
}
