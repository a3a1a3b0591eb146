use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Claim-once set of probe and page keys.
///
/// Keys are either `METHOD` followed by the full URL, for probes, or the plain
/// URL, for frontier pages. Nothing is ever removed during a run.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: RwLock<HashSet<String>>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `true` only for the first caller.
    pub fn try_claim(&self, key: &str) -> bool {
        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(key) {
            return false;
        }
        seen.insert(key.to_string())
    }

    pub fn try_claim_probe(&self, method: &str, url: &str) -> bool {
        self.try_claim(&probe_key(method, url))
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        self.seen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn probe_key(method: &str, url: &str) -> String {
    format!("{}{}", method, url)
}
