use crate::engine::{Context, Finding};
use crate::frontier::Candidate;
use crate::tracker::Tracked;
use burrow_scanner::links::extract_links;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, trace};

/// One request for the pool to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeJob {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCommand {
    Grow,
    Shrink,
}

type JobReceiver = Arc<Mutex<mpsc::Receiver<Tracked<ProbeJob>>>>;
type StopReceiver = Arc<Mutex<mpsc::UnboundedReceiver<()>>>;

/// Resizable set of workers sharing one job queue.
///
/// Shrinking posts a stop token that the first idle worker to see it
/// consumes, so in-flight jobs always finish.
pub(crate) struct WorkerPool {
    ctx: Arc<Context>,
    jobs: JobReceiver,
    stop_tx: mpsc::UnboundedSender<()>,
    stop_rx: StopReceiver,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub(crate) fn new(ctx: Arc<Context>, jobs: mpsc::Receiver<Tracked<ProbeJob>>) -> Self {
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            jobs: Arc::new(Mutex::new(jobs)),
            stop_tx,
            stop_rx: Arc::new(Mutex::new(stop_rx)),
            workers: JoinSet::new(),
        }
    }

    pub(crate) fn grow(&mut self) {
        let count = self.ctx.counters.workers.fetch_add(1, Ordering::AcqRel) + 1;
        self.workers.spawn(worker(
            Arc::clone(&self.ctx),
            Arc::clone(&self.jobs),
            Arc::clone(&self.stop_rx),
        ));
        debug!("Worker added, {} running", count);
    }

    /// Ask one worker to exit. The last worker is never removed, otherwise
    /// queued jobs would never drain.
    pub(crate) fn shrink(&mut self) -> bool {
        let shrunk = self
            .ctx
            .counters
            .workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > 1).then(|| n - 1)
            })
            .is_ok();
        if shrunk && self.stop_tx.send(()).is_ok() {
            debug!("Worker removal requested");
            return true;
        }
        false
    }

    /// Apply resize commands until the task is aborted.
    pub(crate) async fn supervise(mut self, mut commands: mpsc::UnboundedReceiver<PoolCommand>) {
        loop {
            tokio::select! {
                Some(command) = commands.recv() => match command {
                    PoolCommand::Grow => self.grow(),
                    PoolCommand::Shrink => {
                        self.shrink();
                    }
                },
                Some(joined) = self.workers.join_next() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!("Worker panicked: {}", e);
                        self.ctx.counters.workers.fetch_sub(1, Ordering::AcqRel);
                    }
                }
                else => break,
            }
        }
    }
}

async fn worker(ctx: Arc<Context>, jobs: JobReceiver, stop: StopReceiver) {
    loop {
        let job = tokio::select! {
            biased;
            Some(()) = async { stop.lock().await.recv().await } => {
                debug!("Worker stopping");
                return;
            }
            job = async { jobs.lock().await.recv().await } => job,
        };

        match job {
            Some(job) => test_url(&ctx, job).await,
            None => return,
        }
    }
}

/// Evaluate one job and feed its consequences back into the pipeline.
async fn test_url(ctx: &Context, job: Tracked<ProbeJob>) {
    let (job, _ticket) = job.into_parts();

    let evaluation = ctx.evaluator.evaluate(&job.method, &job.url).await;
    ctx.counters.tested.fetch_add(1, Ordering::Relaxed);

    if !evaluation.good && !ctx.config.show_all {
        return;
    }

    if evaluation.good
        && !job.url.ends_with('/')
        && let Some(response) = &evaluation.response
    {
        ctx.new_urls
            .push(Candidate {
                url: format!("{}/", job.url),
                reference: response.url.clone(),
                result: Some(Arc::clone(response)),
            })
            .await;
    }

    if evaluation.good {
        ctx.counters.confirmed.fetch_add(1, Ordering::Relaxed);
    }
    let finding = Finding::new(
        job.method.clone(),
        job.url.clone(),
        evaluation.response.clone(),
        evaluation.good,
        ctx.tracker.ticket(),
    );
    if ctx.findings.send(finding).await.is_err() {
        trace!("Findings receiver closed, dropping {}", job.url);
    }

    if evaluation.good
        && ctx.config.spidering()
        && let Some(response) = &evaluation.response
    {
        for link in extract_links(&response.body) {
            trace!("Found URL on page: {}", link);
            ctx.new_urls
                .push(Candidate {
                    url: link,
                    reference: response.url.clone(),
                    result: None,
                })
                .await;
        }
    }
}
