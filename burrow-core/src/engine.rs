use crate::config::Config;
use crate::dirbust::{StopSignal, random_token};
use crate::error::{EngineError, Result};
use crate::evaluator::Evaluator;
use crate::frontier::{self, Candidate, Page};
use crate::hosts::HostRegistry;
use crate::ledger::DedupLedger;
use crate::pool::{PoolCommand, ProbeJob, WorkerPool};
use crate::seeder;
use crate::tracker::{Queue, Ticket, Tracked, WorkTracker, queue, unbounded_queue};
use burrow_scanner::{ClientOptions, ProbeResponse, Requester, ScanError, build_client, host_key};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use url::Url;

/// Capacities of the bounded pipeline queues. Pages are unbounded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueSizes {
    pub(crate) new_urls: usize,
    pub(crate) jobs: usize,
    pub(crate) findings: usize,
}

impl Default for QueueSizes {
    fn default() -> Self {
        Self {
            new_urls: 10000,
            jobs: 1000,
            findings: 1000,
        }
    }
}

/// One evaluated probe, as delivered to the results consumer.
///
/// The run is not finished while a finding is alive, so consumers should drop
/// each one once it has been written out.
#[derive(Debug)]
pub struct Finding {
    pub method: String,
    pub url: String,
    pub response: Option<Arc<ProbeResponse>>,
    pub good: bool,
    _ticket: Ticket,
}

impl Finding {
    pub(crate) fn new(
        method: String,
        url: String,
        response: Option<Arc<ProbeResponse>>,
        good: bool,
        ticket: Ticket,
    ) -> Self {
        Self {
            method,
            url,
            response,
            good,
            _ticket: ticket,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) tested: AtomicU64,
    pub(crate) confirmed: AtomicU64,
    pub(crate) workers: AtomicUsize,
    pub(crate) dirb_progress: AtomicUsize,
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub tested: u64,
    pub confirmed: u64,
    pub workers: usize,
    pub dirb_progress: usize,
    pub wordlist_len: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunSummary {
    pub tested: u64,
    pub confirmed: u64,
    pub hosts: usize,
    pub elapsed: Duration,
}

/// Everything the pipeline tasks share for the length of a run.
pub(crate) struct Context {
    pub(crate) config: Arc<Config>,
    pub(crate) ledger: DedupLedger,
    pub(crate) hosts: Arc<HostRegistry>,
    pub(crate) evaluator: Evaluator,
    pub(crate) counters: Arc<Counters>,
    pub(crate) stop_dir: Arc<StopSignal>,
    pub(crate) tracker: WorkTracker,
    pub(crate) pages: Queue<Page>,
    pub(crate) new_urls: Queue<Candidate>,
    pub(crate) jobs: Queue<ProbeJob>,
    pub(crate) findings: mpsc::Sender<Finding>,
}

impl Context {
    /// A URL is in scope when its host was seeded, already followed, or
    /// whitelisted.
    pub(crate) fn in_scope(&self, url: &Url) -> bool {
        let key = host_key(url);
        self.hosts.host_known(&key)
            || self.config.whitelist.contains(&key)
            || url
                .host_str()
                .is_some_and(|host| self.config.whitelist.contains(host))
    }
}

/// Clonable control surface for a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    counters: Arc<Counters>,
    stop_dir: Arc<StopSignal>,
    pool: mpsc::UnboundedSender<PoolCommand>,
    tracker: WorkTracker,
    wordlist_len: usize,
}

impl EngineHandle {
    pub fn add_worker(&self) -> bool {
        self.pool.send(PoolCommand::Grow).is_ok()
    }

    pub fn remove_worker(&self) -> bool {
        self.pool.send(PoolCommand::Shrink).is_ok()
    }

    /// Abandon the directory currently being expanded. Other work continues.
    pub fn stop_current_dir(&self) {
        self.stop_dir.request();
    }

    pub fn stats(&self) -> Stats {
        Stats {
            tested: self.counters.tested.load(Ordering::Relaxed),
            confirmed: self.counters.confirmed.load(Ordering::Relaxed),
            workers: self.counters.workers.load(Ordering::Relaxed),
            dirb_progress: self.counters.dirb_progress.load(Ordering::Relaxed),
            wordlist_len: self.wordlist_len,
            pending: self.tracker.pending(),
        }
    }
}

/// A configured discovery run.
pub struct Engine {
    ctx: Arc<Context>,
    seeds: Vec<Url>,
    canary: String,
    pages_rx: mpsc::UnboundedReceiver<Tracked<Page>>,
    new_urls_rx: mpsc::Receiver<Tracked<Candidate>>,
    jobs_rx: mpsc::Receiver<Tracked<ProbeJob>>,
    pool_tx: mpsc::UnboundedSender<PoolCommand>,
    pool_rx: mpsc::UnboundedReceiver<PoolCommand>,
}

impl Engine {
    /// Validate the configuration and seeds and prepare the pipeline.
    ///
    /// Returns the engine and the receiving end of the findings sink, which
    /// must be drained while the engine runs.
    pub fn new(config: Config, seeds: Vec<String>) -> Result<(Self, mpsc::Receiver<Finding>)> {
        Self::with_queue_sizes(config, seeds, QueueSizes::default())
    }

    pub(crate) fn with_queue_sizes(
        config: Config,
        seeds: Vec<String>,
        sizes: QueueSizes,
    ) -> Result<(Self, mpsc::Receiver<Finding>)> {
        config.validate()?;
        if seeds.is_empty() {
            return Err(EngineError::NoSeeds);
        }

        let seeds = seeds
            .iter()
            .map(|seed| parse_seed(seed))
            .collect::<Result<Vec<_>>>()?;

        let requester = build_requester(&config, &config.client_options())?;
        let mirror = config
            .mirror_client_options()
            .map(|options| build_requester(&config, &options))
            .transpose()?;

        let hosts = Arc::new(HostRegistry::new());
        for seed in &seeds {
            hosts.register_host(seed);
        }

        let canary = config
            .canary
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(random_token);

        let config = Arc::new(config);
        let tracker = WorkTracker::new();
        let (pages, pages_rx) = unbounded_queue(&tracker);
        let (new_urls, new_urls_rx) = queue(sizes.new_urls, &tracker);
        let (jobs, jobs_rx) = queue(sizes.jobs, &tracker);
        let (findings, findings_rx) = mpsc::channel(sizes.findings);
        let (pool_tx, pool_rx) = mpsc::unbounded_channel();

        let ctx = Arc::new(Context {
            evaluator: Evaluator::new(Arc::clone(&config), requester, mirror, Arc::clone(&hosts)),
            config,
            ledger: DedupLedger::new(),
            hosts,
            counters: Arc::new(Counters::default()),
            stop_dir: Arc::new(StopSignal::new()),
            tracker,
            pages,
            new_urls,
            jobs,
            findings,
        });

        let engine = Self {
            ctx,
            seeds,
            canary,
            pages_rx,
            new_urls_rx,
            jobs_rx,
            pool_tx,
            pool_rx,
        };
        Ok((engine, findings_rx))
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            counters: Arc::clone(&self.ctx.counters),
            stop_dir: Arc::clone(&self.ctx.stop_dir),
            pool: self.pool_tx.clone(),
            tracker: self.ctx.tracker.clone(),
            wordlist_len: self.ctx.config.wordlist.len(),
        }
    }

    pub fn canary(&self) -> &str {
        &self.canary
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Run until every queued unit of work has been processed.
    pub async fn run(self) -> Result<RunSummary> {
        let Engine {
            ctx,
            seeds,
            canary,
            pages_rx,
            new_urls_rx,
            jobs_rx,
            pool_tx,
            pool_rx,
        } = self;
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        tasks.spawn(frontier::run_request_manager(Arc::clone(&ctx), pages_rx));
        tasks.spawn(frontier::run_new_url_manager(Arc::clone(&ctx), new_urls_rx));

        let mut pool = WorkerPool::new(Arc::clone(&ctx), jobs_rx);
        for _ in 0..ctx.config.threads {
            pool.grow();
        }
        tasks.spawn(pool.supervise(pool_rx));

        let mut seeders = JoinSet::new();
        for seed in seeds {
            info!("Starting {}", seed);
            let ticket = ctx.tracker.ticket();
            let ctx = Arc::clone(&ctx);
            let canary = canary.clone();
            seeders.spawn(async move {
                let _ticket = ticket;
                seeder::seed_host(ctx, seed, canary).await
            });
        }

        let idle = ctx.tracker.wait_idle();
        tokio::pin!(idle);
        let outcome = loop {
            tokio::select! {
                _ = &mut idle => break Ok(()),
                Some(joined) = seeders.join_next() => {
                    if let Err(e) = seeder_outcome(joined) {
                        break Err(e);
                    }
                }
                Some(joined) = tasks.join_next() => {
                    break Err(match joined {
                        Err(e) => EngineError::Scan(ScanError::from(e)),
                        Ok(()) => EngineError::Scan(ScanError::Other(
                            "pipeline task exited early".to_string(),
                        )),
                    });
                }
            }
        };

        let outcome = match outcome {
            Ok(()) => {
                let mut result = Ok(());
                while let Some(joined) = seeders.join_next().await {
                    if let Err(e) = seeder_outcome(joined) {
                        result = Err(e);
                    }
                }
                result
            }
            Err(e) => {
                seeders.abort_all();
                Err(e)
            }
        };

        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        while seeders.join_next().await.is_some() {}
        drop(pool_tx);

        let summary = RunSummary {
            tested: ctx.counters.tested.load(Ordering::Relaxed),
            confirmed: ctx.counters.confirmed.load(Ordering::Relaxed),
            hosts: ctx.hosts.len(),
            elapsed: started.elapsed(),
        };
        debug!("Run finished: {:?}", summary);

        outcome.map(|()| summary)
    }
}

fn seeder_outcome(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(EngineError::Scan(ScanError::from(e))),
    }
}

fn parse_seed(seed: &str) -> Result<Url> {
    let url = Url::parse(seed.trim())
        .map_err(|e| EngineError::Scan(ScanError::InvalidUrl(format!("{}: {}", seed, e))))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(EngineError::Scan(ScanError::InvalidUrl(format!(
            "{}: missing host",
            seed
        )))),
        other => Err(EngineError::Scan(ScanError::UnsupportedScheme(
            other.to_string(),
        ))),
    }
}

fn build_requester(config: &Config, options: &ClientOptions) -> Result<Requester> {
    let client = build_client(options)?;
    let mut requester = Requester::new(client)
        .with_user_agent(config.user_agent.as_str())
        .with_headers(&config.request_headers())?
        .with_blacklist(config.blacklist.iter().cloned());

    if let Some(cookies) = &config.cookies {
        requester = requester.with_cookies(cookies.as_str());
    }
    if let Some(auth) = &config.auth {
        requester = requester.with_basic_auth(auth.as_str());
    }
    if let Some(vhost) = &config.vhost {
        requester = requester.with_vhost(vhost.as_str());
    }
    if let Some(body) = &config.body {
        requester = requester.with_body(body.as_str());
    }
    Ok(requester)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_seeds() {
        let result = Engine::new(Config::default(), Vec::new());
        assert!(matches!(result, Err(EngineError::NoSeeds)));
    }

    #[test]
    fn test_new_rejects_bad_seed() {
        let result = Engine::new(Config::default(), vec!["ftp://example.com/".to_string()]);
        assert!(matches!(
            result,
            Err(EngineError::Scan(ScanError::UnsupportedScheme(_)))
        ));
        let result = Engine::new(Config::default(), vec!["not a url".to_string()]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_canary_defaults_to_random_token() {
        let (engine, _rx) =
            Engine::new(Config::default(), vec!["http://127.0.0.1:1/".to_string()]).unwrap();
        assert_eq!(engine.canary().len(), 36);

        let config = Config {
            canary: Some("fixed".to_string()),
            ..Default::default()
        };
        let (engine, _rx) = Engine::new(config, vec!["http://127.0.0.1:1/".to_string()]).unwrap();
        assert_eq!(engine.canary(), "fixed");
    }

    #[tokio::test]
    async fn test_handle_reports_initial_stats() {
        let config = Config {
            wordlist: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let (engine, _rx) = Engine::new(config, vec!["http://127.0.0.1:1/".to_string()]).unwrap();
        let stats = engine.handle().stats();
        assert_eq!(stats.wordlist_len, 2);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.workers, 0);
    }

    #[tokio::test]
    async fn test_run_finishes_with_tiny_queues() {
        use wiremock::matchers::{any, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        for n in 0..20 {
            let links: String = (0..4)
                .map(|k| format!(r#"<a href="/w{}-l{}">link</a> "#, n, k))
                .collect();
            Mock::given(path(format!("/w{}", n)))
                .respond_with(ResponseTemplate::new(200).set_body_string(links))
                .with_priority(1)
                .mount(&server)
                .await;
        }
        Mock::given(any())
            .respond_with(ResponseTemplate::new(404).set_body_string("404 page not found"))
            .with_priority(10)
            .mount(&server)
            .await;

        // every hit links out while the directory is still being expanded
        let config = Config {
            threads: 2,
            wordlist: (0..20).map(|n| format!("w{}", n)).collect(),
            no_head: true,
            no_robots: true,
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let sizes = QueueSizes {
            new_urls: 1,
            jobs: 1,
            findings: 1,
        };
        let (engine, mut findings) =
            Engine::with_queue_sizes(config, vec![server.uri()], sizes).unwrap();
        let drain = tokio::spawn(async move {
            let mut good = 0;
            while let Some(finding) = findings.recv().await {
                good += usize::from(finding.good);
            }
            good
        });

        let summary = tokio::time::timeout(Duration::from_secs(60), engine.run())
            .await
            .expect("run does not stall on full queues")
            .unwrap();
        let good = drain.await.unwrap();

        assert_eq!(summary.confirmed, 20);
        assert_eq!(good, 20);
    }
}
