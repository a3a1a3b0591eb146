use crate::engine::Context;
use crate::error::{EngineError, Result};
use crate::frontier::{Candidate, Page};
use burrow_scanner::{host_key, normalize_url};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, trace};
use url::Url;

static HTML_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s?html\s?>").expect("static regex is valid"));

/// Robots directives that never name a path worth probing.
const IGNORED_DIRECTIVES: &[&str] = &["user-agent", "crawl-delay", "host", "sitemap"];

/// Start a run against one seed: capture the soft-404 baseline, queue the
/// seed page, and pull in robots.txt.
pub(crate) async fn seed_host(ctx: Arc<Context>, seed: Url, canary: String) -> Result<()> {
    let root = host_root(&seed);

    if !ctx.config.no_wildcard_checks {
        let canary_url = root.join(&canary)?;
        match ctx.evaluator.requester().send("GET", canary_url.as_str()).await {
            Ok(response) => {
                debug!(
                    "Canary sent: {}, Response: {}",
                    canary_url,
                    response.status_line()
                );
                ctx.hosts
                    .record_baseline(&host_key(&seed), &seed, Arc::new(response));
            }
            Err(e) if ctx.config.input_list => {
                error!("Canary error for {}, skipping host: {}", canary_url, e);
                return Ok(());
            }
            Err(e) => {
                return Err(EngineError::Canary {
                    url: canary_url.to_string(),
                    source: e,
                });
            }
        }
    }

    let start = normalize_url(seed.as_str(), &seed)?;
    if !start.ends_with('/') {
        queue_page(&ctx, format!("{}/", start), &seed).await;
    }
    queue_page(&ctx, start, &seed).await;

    if !ctx.config.no_robots {
        ingest_robots(&ctx, &root).await;
    }

    Ok(())
}

async fn queue_page(ctx: &Context, url: String, reference: &Url) {
    if ctx.ledger.try_claim(&url) {
        trace!("URL Added: {}", url);
        ctx.pages
            .push(Page {
                url,
                reference: reference.clone(),
                result: None,
            })
            .await;
    }
}

async fn ingest_robots(ctx: &Context, root: &Url) {
    let robots_url = match root.join("robots.txt") {
        Ok(url) => url,
        Err(e) => {
            error!("Robots error for {}: {}", root, e);
            return;
        }
    };

    let response = match ctx.evaluator.requester().send("GET", robots_url.as_str()).await {
        Ok(response) => response,
        Err(e) => {
            error!("Robots error, check url is correct: {}: {}", robots_url, e);
            return;
        }
    };
    debug!(
        "Robots retrieved: {}, Response: {}",
        robots_url,
        response.status_line()
    );

    if !(200..300).contains(&response.status_code) {
        return;
    }

    let content = response.body_text();
    if HTML_MARKER.is_match(&content) {
        error!("Unexpected robots.txt content at {} (contained html?)", robots_url);
        return;
    }

    let base = root.as_str().trim_end_matches('/');
    for path in parse_robots(&content) {
        let url = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        ctx.new_urls
            .push(Candidate {
                url,
                reference: root.clone(),
                result: None,
            })
            .await;
    }
}

/// Values of every `key: value` robots line whose key can name a path.
pub fn parse_robots(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(key, value)| {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if value.is_empty() || IGNORED_DIRECTIVES.contains(&key.as_str()) {
                None
            } else {
                Some(value.to_string())
            }
        })
        .collect()
}

fn host_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_robots_skips_metadata() {
        let robots = "User-agent: *\n\
                      Disallow: /private/\n\
                      Allow: /public\n\
                      Crawl-delay: 10\n\
                      Host: example.com\n\
                      Sitemap: http://example.com/sitemap.xml\n\
                      Disallow:\n\
                      # comment without colon\n\
                      Noindex: relative/page";
        assert_eq!(
            parse_robots(robots),
            vec!["/private/", "/public", "relative/page"]
        );
    }

    #[test]
    fn test_html_marker() {
        assert!(HTML_MARKER.is_match("<!doctype html><HTML><body>404</body>"));
        assert!(HTML_MARKER.is_match("< html >"));
        assert!(!HTML_MARKER.is_match("Disallow: /html/"));
    }

    #[test]
    fn test_host_root() {
        let url = Url::parse("http://h:8080/a/b?q=1#x").unwrap();
        assert_eq!(host_root(&url).as_str(), "http://h:8080/");
    }
}
