use crate::engine::Context;
use crate::frontier::Page;
use crate::pool::ProbeJob;
use burrow_scanner::{detect_soft_404, host_key};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

/// Level-triggered request to abandon the directory currently being busted.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Consume a pending request, returning whether there was one.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

// Reserved characters a path segment may carry unescaped.
const SEGMENT_SAFE: [(&str, &str); 6] = [
    ("%24", "$"),
    ("%26", "&"),
    ("%2B", "+"),
    ("%3A", ":"),
    ("%3D", "="),
    ("%40", "@"),
];

/// Percent-encode `word` as a single path segment. `/ ; , ?` and anything
/// outside the unreserved set are escaped, `$ & + : = @` are kept.
pub fn escape_segment(word: &str) -> String {
    let mut escaped = urlencoding::encode(word).into_owned();
    for (encoded, raw) in SEGMENT_SAFE {
        if escaped.contains(encoded) {
            escaped = escaped.replace(encoded, raw);
        }
    }
    escaped
}

/// Random path segment that should not exist on any server.
pub fn random_token() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// Expand the wordlist against a directory-shaped page.
pub(crate) async fn bust_directory(ctx: &Context, page: &Page) {
    if !ctx.config.no_wildcard_checks && is_wildcard(ctx, page).await {
        info!("Wildcard response detected, skipping dirbusting of {}", page.url);
        return;
    }

    if !ctx.config.no_start_stop {
        info!("Dirbusting {}", page.url);
    }

    ctx.counters.dirb_progress.store(0, Ordering::Relaxed);
    for word in &ctx.config.wordlist {
        ctx.counters.dirb_progress.fetch_add(1, Ordering::Relaxed);
        if word.is_empty() {
            continue;
        }
        if ctx.stop_dir.take() {
            info!("Stopped dirbusting {}", page.url);
            break;
        }

        let word: Cow<'_, str> = if ctx.config.no_encode {
            Cow::Borrowed(word)
        } else {
            Cow::Owned(escape_segment(word))
        };
        combinate(ctx, &page.url, &word).await;
    }

    // A stop aimed at this directory must not leak into the next one.
    ctx.stop_dir.take();

    if !ctx.config.no_start_stop {
        info!("Finished dirbusting: {}", page.url);
    }
}

/// Probe a random name under the directory. A good answer that does not
/// resemble the host's canary means the directory answers everything.
async fn is_wildcard(ctx: &Context, page: &Page) -> bool {
    let method = ctx.config.methods.first().map_or("GET", String::as_str);
    let probe_url = format!("{}{}", page.url, random_token());

    let evaluation = ctx.evaluator.evaluate(method, &probe_url).await;
    if !evaluation.good {
        return false;
    }

    let baseline = Url::parse(&page.url)
        .ok()
        .and_then(|url| ctx.hosts.baseline(&host_key(&url)));
    let (soft_404, similarity) = detect_soft_404(
        evaluation.response.as_deref(),
        baseline.as_deref(),
        ctx.config.ratio_404,
    );
    debug!(
        "Wildcard probe {} was good, similarity to canary {:.3}",
        probe_url, similarity
    );

    !soft_404
}

/// Submit every method/extension/slash form of `word` under `dir`.
async fn combinate(ctx: &Context, dir: &str, word: &str) {
    for method in &ctx.config.methods {
        for ext in ctx.config.extensions.iter().filter(|e| !e.is_empty()) {
            submit(ctx, method, format!("{}{}.{}", dir, word, ext)).await;
        }
        if ctx.config.append_slash {
            submit(ctx, method, format!("{}{}/", dir, word)).await;
        }
        submit(ctx, method, format!("{}{}", dir, word)).await;
    }
}

async fn submit(ctx: &Context, method: &str, url: String) {
    if ctx.ledger.try_claim_probe(method, &url) {
        ctx.jobs
            .push(ProbeJob {
                method: method.to_string(),
                url,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_is_drainable() {
        let signal = StopSignal::new();
        assert!(!signal.take());

        signal.request();
        signal.request();
        assert!(signal.is_requested());
        assert!(signal.take());
        assert!(!signal.take());
        assert!(!signal.is_requested());
    }

    #[test]
    fn test_escape_segment() {
        assert_eq!(escape_segment("admin"), "admin");
        assert_eq!(
            escape_segment("a b+c:d@e;f=g&h$i/j?k,l~m"),
            "a%20b+c:d@e%3Bf=g&h$i%2Fj%3Fk%2Cl~m"
        );
        assert_eq!(escape_segment("100%"), "100%25");
        assert_eq!(escape_segment("%24"), "%2524");
        assert_eq!(escape_segment("café"), "caf%C3%A9");
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), 36);
        assert_eq!(token, token.to_uppercase());
        assert_ne!(token, random_token());
    }
}
