use std::sync::Arc;

use log::{debug, error};
use tokio::sync::{mpsc, Mutex};

use crate::fetch::{ensure_concurrency_limit, FetchOutcome, FetchResult, RemoteFetcher};

/// Lifecycle of a single fetch job within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Dispatched,
    Succeeded,
    Failed,
}

/// One unit of remote work. A job is owned by exactly one worker while it
/// runs and handed back through the results queue afterwards.
#[derive(Debug)]
pub struct FetchJob<K, R> {
    pub key: K,
    pub url: String,
    state: JobState,
    records: Vec<R>,
    failure: Option<String>,
}

impl<K, R> FetchJob<K, R> {
    pub fn new(key: K, url: String) -> Self {
        Self {
            key,
            url,
            state: JobState::Pending,
            records: Vec::new(),
            failure: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Succeeded
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn succeed(&mut self, records: Vec<R>) {
        self.state = JobState::Succeeded;
        self.records = records;
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.state = JobState::Failed;
        self.failure = Some(reason.into());
    }
}

/// Every job submitted for a cycle, back in a terminal state. Completion order
/// is arbitrary.
#[derive(Debug)]
pub struct CycleResults<K, R> {
    pub completed: Vec<FetchJob<K, R>>,
}

impl<K, R> CycleResults<K, R> {
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn succeeded_count(&self) -> usize {
        self.completed.iter().filter(|job| job.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.succeeded_count()
    }

    /// Keep the successful jobs; failures are logged and dropped.
    pub fn into_succeeded(self) -> Vec<FetchJob<K, R>> {
        self.completed
            .into_iter()
            .filter(|job| {
                if !job.is_success() {
                    debug!(
                        "dropping failed job {}: {}",
                        job.url,
                        job.failure().unwrap_or("unknown failure")
                    );
                }
                job.is_success()
            })
            .collect()
    }
}

/// Fixed-size worker pool draining a shared job queue into a results queue.
#[derive(Clone)]
pub struct FetchCoordinator {
    fetcher: RemoteFetcher,
    workers: usize,
}

impl FetchCoordinator {
    pub fn new(fetcher: RemoteFetcher, workers: usize) -> Self {
        Self {
            fetcher,
            workers: ensure_concurrency_limit(workers),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    /// Run every job to a terminal state and return once all of them are
    /// collected. `decode` turns a payload into records for the job's key; a
    /// decode error fails the job just like an exhausted fetch.
    pub async fn run<K, R, D>(&self, jobs: Vec<FetchJob<K, R>>, decode: D) -> CycleResults<K, R>
    where
        K: Send + 'static,
        R: Send + 'static,
        D: Fn(&K, &[u8]) -> FetchResult<Vec<R>> + Send + Sync + 'static,
    {
        let total = jobs.len();
        if total == 0 {
            return CycleResults {
                completed: Vec::new(),
            };
        }

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for job in jobs {
            // The receiver is alive until the workers start, so this cannot fail.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let queue = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let decode = Arc::new(decode);

        let worker_count = self.workers.min(total);
        let mut handles = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let queue = Arc::clone(&queue);
            let results = result_tx.clone();
            let fetcher = self.fetcher.clone();
            let decode = Arc::clone(&decode);

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(mut job) = next else {
                        break;
                    };

                    job.state = JobState::Dispatched;
                    execute(&fetcher, decode.as_ref(), &mut job).await;

                    if results.send(job).is_err() {
                        break;
                    }
                }
                debug!("fetch worker {worker} idle");
            }));
        }
        drop(result_tx);

        let mut completed = Vec::with_capacity(total);
        while completed.len() < total {
            match result_rx.recv().await {
                Some(job) => completed.push(job),
                None => break,
            }
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!("fetch worker aborted: {err}");
            }
        }

        if completed.len() < total {
            error!(
                "collected {} of {total} fetch results; the rest were lost with their worker",
                completed.len()
            );
        }

        CycleResults { completed }
    }
}

async fn execute<K, R, D>(fetcher: &RemoteFetcher, decode: &D, job: &mut FetchJob<K, R>)
where
    D: Fn(&K, &[u8]) -> FetchResult<Vec<R>>,
{
    match fetcher.fetch(&job.url).await {
        FetchOutcome::Succeeded(body) => match decode(&job.key, &body) {
            Ok(records) => job.succeed(records),
            Err(err) => job.fail(format!("undecodable payload: {err}")),
        },
        FetchOutcome::Exhausted {
            attempts,
            last_error,
        } => job.fail(format!("gave up after {attempts} attempt(s): {last_error}")),
        FetchOutcome::Cancelled => job.fail("cancelled by shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rand::Rng;

    use super::*;
    use crate::config::HttpSettings;
    use crate::error::AppError;
    use crate::fetch::client::testing::StubTransport;
    use crate::fetch::{shutdown_channel, ShutdownSignal, Transport};

    /// Answers every URL after a random pause; URLs containing `/fail/` error.
    #[derive(Default)]
    struct JitterTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for JitterTransport {
        async fn get(&self, url: &str) -> FetchResult<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = { rand::thread_rng().gen_range(0..15u64) };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.contains("/fail/") {
                Err(AppError::message(format!("{url} returned 502")))
            } else {
                Ok(url.as_bytes().to_vec())
            }
        }
    }

    fn coordinator(transport: Arc<dyn Transport>, workers: usize) -> FetchCoordinator {
        let http = HttpSettings {
            max_attempts: 2,
            ..HttpSettings::default()
        };
        FetchCoordinator::new(
            RemoteFetcher::new(transport, &http, ShutdownSignal::never()),
            workers,
        )
    }

    fn echo(key: &usize, body: &[u8]) -> FetchResult<Vec<usize>> {
        assert!(!body.is_empty());
        Ok(vec![*key])
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn drains_every_job_exactly_once() {
        let transport = Arc::new(JitterTransport::default());
        let coordinator = coordinator(transport.clone(), 25);

        let mut expected_failures = HashSet::new();
        let jobs: Vec<FetchJob<usize, usize>> = (0..200)
            .map(|i| {
                let kind = if i % 7 == 0 {
                    expected_failures.insert(i);
                    "fail"
                } else {
                    "ok"
                };
                FetchJob::new(i, format!("http://stub/{kind}/{i}"))
            })
            .collect();

        let results = coordinator.run(jobs, echo).await;

        assert_eq!(results.len(), 200);
        let keys: HashSet<usize> = results.completed.iter().map(|job| job.key).collect();
        assert_eq!(keys.len(), 200);

        let failed: HashSet<usize> = results
            .completed
            .iter()
            .filter(|job| job.state() == JobState::Failed)
            .map(|job| job.key)
            .collect();
        assert_eq!(failed, expected_failures);
        assert_eq!(results.succeeded_count(), 200 - expected_failures.len());

        assert!(transport.peak.load(Ordering::SeqCst) <= 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pool_size_bounds_concurrency() {
        let transport = Arc::new(JitterTransport::default());
        let coordinator = coordinator(transport.clone(), 3);

        let jobs = (0..40)
            .map(|i| FetchJob::new(i, format!("http://stub/ok/{i}")))
            .collect();
        let results = coordinator.run(jobs, echo).await;

        assert_eq!(results.succeeded_count(), 40);
        assert!(transport.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn empty_cycle_returns_immediately() {
        let coordinator = coordinator(Arc::new(StubTransport::new()), 4);
        let results = coordinator
            .run(Vec::<FetchJob<usize, usize>>::new(), echo)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn decode_errors_fail_the_job() {
        let stub = Arc::new(StubTransport::new());
        stub.serve("http://stub/a", "not json");
        stub.serve("http://stub/b", "[1, 2]");
        let coordinator = coordinator(stub, 2);

        let jobs = vec![
            FetchJob::new("a", "http://stub/a".to_string()),
            FetchJob::new("b", "http://stub/b".to_string()),
        ];
        let results = coordinator
            .run(jobs, |_: &&str, body: &[u8]| {
                Ok(serde_json::from_slice::<Vec<i64>>(body)?)
            })
            .await;

        assert_eq!(results.failed_count(), 1);
        let succeeded = results.into_succeeded();
        assert_eq!(succeeded.len(), 1);
        assert_eq!(succeeded[0].key, "b");
        assert_eq!(succeeded[0].records(), &[1, 2]);
    }

    #[tokio::test]
    async fn failure_reason_is_kept_on_the_job() {
        let coordinator = coordinator(Arc::new(StubTransport::new()), 1);
        let results = coordinator
            .run(vec![FetchJob::new(1usize, "http://stub/gone".to_string())], echo)
            .await;

        let job = &results.completed[0];
        assert_eq!(job.state(), JobState::Failed);
        assert!(job.failure().unwrap().contains("2 attempt(s)"));
    }

    #[tokio::test]
    async fn shutdown_fails_remaining_jobs_without_fetching() {
        let stub = Arc::new(StubTransport::new());
        let (trigger, signal) = shutdown_channel();
        let http = HttpSettings::default();
        let coordinator =
            FetchCoordinator::new(RemoteFetcher::new(stub.clone(), &http, signal), 4);

        trigger.trigger();
        let jobs = (0..10)
            .map(|i| FetchJob::new(i, format!("http://stub/{i}")))
            .collect();
        let results = coordinator.run(jobs, echo).await;

        assert_eq!(results.len(), 10);
        assert_eq!(results.failed_count(), 10);
        assert_eq!(stub.total_calls(), 0);
    }
}
