//! Request and new-URL managers.
//!
//! Pages flow from the new-URL manager to the request manager, which turns
//! each into base probes and, for directories, a wordlist expansion. The
//! page queue is unbounded so the new-URL manager never waits on a request
//! manager that is itself waiting on the workers.

use crate::dirbust;
use crate::engine::Context;
use crate::pool::ProbeJob;
use crate::tracker::Tracked;
use burrow_scanner::{ProbeResponse, host_key, normalize_url};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, trace};
use url::Url;

/// A normalized URL waiting to be probed and, if a directory, busted.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    /// The page this one was discovered from.
    pub reference: Url,
    /// A response already seen for this URL. Such pages get no base probe.
    pub result: Option<Arc<ProbeResponse>>,
}

/// A raw discovered URL, resolved against `reference` before use.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub reference: Url,
    pub result: Option<Arc<ProbeResponse>>,
}

pub(crate) async fn run_request_manager(
    ctx: Arc<Context>,
    mut pages: mpsc::UnboundedReceiver<Tracked<Page>>,
) {
    while let Some(page) = pages.recv().await {
        handle_page(&ctx, &page).await;
    }
}

async fn handle_page(ctx: &Context, page: &Page) {
    if ctx.evaluator.requester().is_blacklisted(&page.url) {
        info!("Not testing blacklisted URL: {}", page.url);
        return;
    }

    if page.result.is_none() && !ctx.config.no_base {
        for method in &ctx.config.methods {
            if ctx.ledger.try_claim_probe(method, &page.url) {
                ctx.jobs
                    .push(ProbeJob {
                        method: method.clone(),
                        url: page.url.clone(),
                    })
                    .await;
            }
        }
    }

    if !ctx.config.wordlist.is_empty() && page.url.ends_with('/') {
        dirbust::bust_directory(ctx, page).await;
    }
}

pub(crate) async fn run_new_url_manager(
    ctx: Arc<Context>,
    mut candidates: mpsc::Receiver<Tracked<Candidate>>,
) {
    while let Some(candidate) = candidates.recv().await {
        handle_candidate(&ctx, &candidate).await;
    }
}

async fn handle_candidate(ctx: &Context, candidate: &Candidate) {
    let url = match normalize_url(&candidate.url, &candidate.reference) {
        Ok(url) => url,
        Err(e) => {
            error!("Skipping {}: {}", candidate.url, e);
            return;
        }
    };
    let parsed = match Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(e) => panic!("normalized URL {} does not re-parse: {}", url, e),
    };

    if !ctx.config.recursive() || !ctx.in_scope(&parsed) {
        trace!("Out of scope: {}", url);
        return;
    }
    if !ctx.ledger.try_claim(&url) {
        return;
    }

    if ctx.hosts.register_host(&parsed) {
        info!("Following whitelisted host {}", host_key(&parsed));
    }

    trace!("URL Added: {}", url);
    ctx.pages
        .push(Page {
            url,
            reference: candidate.reference.clone(),
            result: candidate.result.clone(),
        })
        .await;

    for dir in ancestor_dirs(&parsed) {
        if ctx.ledger.try_claim(&dir) {
            trace!("URL Added: {}", dir);
            ctx.pages
                .push(Page {
                    url: dir,
                    reference: parsed.clone(),
                    result: candidate.result.clone(),
                })
                .await;
        }
    }
}

/// Every directory above `url`'s path, root first. The URL itself is not
/// included.
pub fn ancestor_dirs(url: &Url) -> Vec<String> {
    let path = url.path().trim_end_matches('/');
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    path.char_indices()
        .filter(|&(_, c)| c == '/')
        .map(|(i, _)| {
            base.set_path(&path[..=i]);
            base.to_string()
        })
        .collect()
}
