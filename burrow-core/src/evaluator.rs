use crate::config::Config;
use crate::hosts::HostRegistry;
use burrow_scanner::{ProbeResponse, Requester, ScanError, detect_soft_404, host_key};
use std::sync::Arc;
use tracing::{error, info, trace};

/// Outcome of probing one `(method, url)` pair.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Last response received, kept for reporting even when not good.
    pub response: Option<Arc<ProbeResponse>>,
    pub good: bool,
}

impl Evaluation {
    fn bad(response: Option<Arc<ProbeResponse>>) -> Self {
        Self {
            response,
            good: false,
        }
    }
}

/// Decides whether a probe found real content.
pub struct Evaluator {
    config: Arc<Config>,
    requester: Requester,
    mirror: Option<Requester>,
    hosts: Arc<HostRegistry>,
}

impl Evaluator {
    pub fn new(
        config: Arc<Config>,
        requester: Requester,
        mirror: Option<Requester>,
        hosts: Arc<HostRegistry>,
    ) -> Self {
        Self {
            config,
            requester,
            mirror,
            hosts,
        }
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub async fn evaluate(&self, method: &str, url: &str) -> Evaluation {
        if method == "GET" && !self.config.no_head {
            let head = match self.send("HEAD", url).await {
                Some(response) => response,
                None => return Evaluation::bad(None),
            };

            if !self.config.status_filter.is_good(head.status_code) {
                return Evaluation::bad(Some(head));
            }

            if self.config.no_get {
                self.mirror("HEAD", url).await;
                return Evaluation {
                    response: Some(head),
                    good: true,
                };
            }
        }

        let response = match self.send(method, url).await {
            Some(response) => response,
            None => return Evaluation::bad(None),
        };

        if !self.config.status_filter.is_good(response.status_code) {
            return Evaluation::bad(Some(response));
        }

        if let Some(bad_body) = self.config.bad_body.as_deref()
            && !bad_body.is_empty()
            && contains_bytes(&response.body, bad_body.as_bytes())
        {
            trace!("{} matched bad body content", url);
            return Evaluation::bad(Some(response));
        }

        if has_bad_header(&response, &self.config.bad_headers) {
            trace!("{} matched a bad header rule", url);
            return Evaluation::bad(Some(response));
        }

        let baseline = self.hosts.baseline(&host_key(&response.url));
        let (soft_404, similarity) =
            detect_soft_404(Some(&response), baseline.as_deref(), self.config.ratio_404);
        if soft_404 {
            trace!("{} looks like a soft 404 ({:.3})", url, similarity);
            return Evaluation::bad(Some(response));
        }

        self.mirror(method, url).await;

        Evaluation {
            response: Some(response),
            good: true,
        }
    }

    async fn send(&self, method: &str, url: &str) -> Option<Arc<ProbeResponse>> {
        match self.requester.send(method, url).await {
            Ok(response) => Some(Arc::new(response)),
            Err(ScanError::Blacklisted(url)) => {
                info!("Not testing blacklisted URL: {}", url);
                None
            }
            Err(e) => {
                error!("{} {}: {}", method, url, e);
                None
            }
        }
    }

    async fn mirror(&self, method: &str, url: &str) {
        if let Some(mirror) = &self.mirror
            && let Err(e) = mirror.send(method, url).await
        {
            error!("Mirror request {} {} failed: {}", method, url, e);
        }
    }
}

/// `Name: prefix` rules. A rule matches when the response carries the header
/// and its trimmed value starts with the trimmed prefix.
fn has_bad_header(response: &ProbeResponse, rules: &[String]) -> bool {
    rules.iter().any(|rule| {
        let (name, prefix) = rule.split_once(':').unwrap_or((rule.as_str(), ""));
        response
            .header(name.trim())
            .filter(|value| !value.is_empty())
            .is_some_and(|value| value.trim().starts_with(prefix.trim()))
    })
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
