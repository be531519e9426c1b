use std::sync::Arc;

use anyhow::Context;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};

use crate::{
    configuration::Settings,
    domain::{
        movie::MovieRecord,
        outcome::{ErrorKind, Outcome},
        seed::SeedEnumerator,
    },
};

use super::{
    record_sink_handler, FetchError, FetchRequest, Fetcher, PageExtractor, RecordSink,
    RetryPolicy, RunStats,
};

type AttemptResult = (FetchRequest, Result<Outcome, FetchError>);

/// Fetches every seed, hands responses to the extractor and dispatches the
/// outcome: records go to the sink, retries are re-enqueued, failures are
/// logged and counted.
pub struct Crawler {
    fetcher: Arc<Fetcher>,
    extractor: Arc<PageExtractor>,
    retry_policy: RetryPolicy,
    fetch_permits: Arc<Semaphore>,
}

impl Crawler {
    pub fn new(
        fetcher: Fetcher,
        extractor: PageExtractor,
        retry_policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Crawler {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            retry_policy,
            fetch_permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub async fn crawl(
        &self,
        seeds: &SeedEnumerator,
        record_sender: mpsc::UnboundedSender<MovieRecord>,
    ) -> RunStats {
        log::info!("Started crawl of {} seed urls", seeds.len());
        let mut tasks = JoinSet::new();

        for url in seeds.iter() {
            self.spawn_attempt(&mut tasks, FetchRequest::new(url));
        }

        self.drain(tasks, record_sender).await
    }

    /// Joins attempts until none are left, spawning retries as they come up.
    async fn drain(
        &self,
        mut tasks: JoinSet<AttemptResult>,
        record_sender: mpsc::UnboundedSender<MovieRecord>,
    ) -> RunStats {
        let mut stats = RunStats::default();

        while let Some(joined) = tasks.join_next().await {
            let (request, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    log::error!("Crawl task did not complete: {:?}", e);
                    stats.task_panic_count += 1;
                    continue;
                }
            };

            match result {
                Ok(outcome) => {
                    stats.response_count += 1;
                    self.dispatch(&mut tasks, &mut stats, &request, outcome, &record_sender);
                }
                Err(e) if e.is_retryable() => {
                    log::warn!("{}", e);
                    if !self.schedule_retry(&mut tasks, &mut stats, &request, &e.reason()) {
                        stats.record_failure(ErrorKind::Transport);
                    }
                }
                Err(e) => {
                    log::error!("{}", e);
                    stats.record_failure(ErrorKind::Transport);
                }
            }
        }

        stats
    }

    fn dispatch(
        &self,
        tasks: &mut JoinSet<AttemptResult>,
        stats: &mut RunStats,
        request: &FetchRequest,
        outcome: Outcome,
        record_sender: &mpsc::UnboundedSender<MovieRecord>,
    ) {
        match outcome {
            Outcome::Record(record) => {
                log::debug!("Scraped from {}: {:?}", request.url, record);
                stats.item_scraped_count += 1;
                if let Err(e) = record_sender.send(record) {
                    log::error!("Record sink channel closed, dropping {}", e.0.source_url);
                }
            }
            Outcome::Retry(retry) => {
                if !self.schedule_retry(tasks, stats, request, &retry.reason) {
                    stats.record_failure(ErrorKind::MissingDataScript);
                }
            }
            Outcome::Failure(e) => {
                log::error!("Failed to extract movie ({}): {}", e.kind(), e);
                stats.record_failure(e.kind());
            }
        }
    }

    /// Returns false when the retry budget for `request` is spent.
    fn schedule_retry(
        &self,
        tasks: &mut JoinSet<AttemptResult>,
        stats: &mut RunStats,
        request: &FetchRequest,
        reason: &str,
    ) -> bool {
        match self.retry_policy.retry(request, reason) {
            Some(next) => {
                stats.record_retry(reason);
                self.spawn_attempt(tasks, next);
                true
            }
            None => {
                stats.retry_max_reached += 1;
                false
            }
        }
    }

    fn spawn_attempt(&self, tasks: &mut JoinSet<AttemptResult>, request: FetchRequest) {
        tasks.spawn(attempt(
            self.fetcher.clone(),
            self.extractor.clone(),
            self.fetch_permits.clone(),
            request,
        ));
    }
}

async fn attempt(
    fetcher: Arc<Fetcher>,
    extractor: Arc<PageExtractor>,
    fetch_permits: Arc<Semaphore>,
    request: FetchRequest,
) -> AttemptResult {
    if !request.delay.is_zero() {
        tokio::time::sleep(request.delay).await;
    }

    let fetched = {
        // Held for the download only, not for the extractor's pause.
        let _permit = fetch_permits.acquire().await.ok();
        log::info!("Fetching {} (attempt {})", request.url, request.attempt + 1);
        fetcher.fetch(&request.url).await
    };

    let result = match fetched {
        Ok(page) => Ok(extractor.extract(page).await),
        Err(e) => Err(e),
    };

    (request, result)
}

/// Runs a full crawl with `settings` and returns its stats. Only setup
/// problems are errors; individual URLs failing are counted, not raised.
pub async fn run(settings: Settings) -> anyhow::Result<RunStats> {
    let seeds = SeedEnumerator::from_urls(settings.extractor.seed_urls.clone())
        .context("Invalid seed url in configuration")?;
    let fetcher = Fetcher::new(&settings.application).context("Failed to build http client")?;
    let extractor = PageExtractor::new(settings.extractor.clone())?;
    let sink = RecordSink::create(&settings.output)
        .await
        .with_context(|| format!("Failed to open output file {}", settings.output.path))?;

    let (record_sender, record_receiver) = mpsc::unbounded_channel::<MovieRecord>();
    let sink_task = tokio::spawn(record_sink_handler(record_receiver, sink));

    let crawler = Crawler::new(
        fetcher,
        extractor,
        RetryPolicy::new(&settings.retry),
        settings.application.concurrency,
    );
    let stats = crawler.crawl(&seeds, record_sender).await;

    let written = sink_task
        .await
        .context("Record sink task panicked")?
        .with_context(|| format!("Failed to write records to {}", settings.output.path))?;
    log::info!("Wrote {} records to {}", written, settings.output.path);
    stats.log_dump();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;
    use tokio::{sync::mpsc, task::JoinSet};
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::{
        configuration::{ApplicationSettings, ExtractorSettings, RetrySettings},
        domain::{outcome::ErrorKind, seed::SeedEnumerator},
        services::{FetchRequest, Fetcher, PageExtractor, RetryPolicy},
    };

    use super::{AttemptResult, Crawler};

    fn movie_page(id: &str, title: &str) -> String {
        let data = json!({
            "props": { "pageProps": { "contentData": {
                "posterData": { "image": { "url": format!("https://img.test/{}.jpg", id) } },
                "entityMetadata": {
                    "id": id,
                    "titleText": { "text": title },
                    "plot": { "plotText": { "plainText": "plot" } }
                },
                "categories": [ { "section": { "items": [
                    { "htmlContent": "<div class=\"ipc-html-content-inner-div\">summary</div>" }
                ] } } ]
            } } }
        });
        format!(
            "<html><body><script id=\"__NEXT_DATA__\" type=\"application/json\">{}</script></body></html>",
            data
        )
    }

    fn crawler(max_retries: u32) -> Crawler {
        crawler_with(max_retries, 0, 4)
    }

    fn crawler_with(max_retries: u32, delay_secs: u64, concurrency: usize) -> Crawler {
        Crawler::new(
            Fetcher::new(&ApplicationSettings::default()).unwrap(),
            PageExtractor::new(ExtractorSettings {
                delay_secs,
                ..ExtractorSettings::default()
            })
            .unwrap(),
            RetryPolicy::new(&RetrySettings {
                max_retries,
                backoff_ms: 0,
            }),
            concurrency,
        )
    }

    fn seeds(server: &MockServer, paths: &[&str]) -> SeedEnumerator {
        SeedEnumerator::from_urls(
            paths
                .iter()
                .map(|p| format!("{}{}", server.uri(), p))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn each_seed_is_fetched_once_without_retries() {
        let server = MockServer::start().await;
        for (p, id) in [("/tt1", "tt1"), ("/tt2", "tt2"), ("/tt3", "tt3")] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_string(movie_page(id, "Movie")))
                .expect(1)
                .mount(&server)
                .await;
        }

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let stats = crawler(2)
            .crawl(&seeds(&server, &["/tt1", "/tt2", "/tt3"]), sender)
            .await;

        assert_eq!(stats.response_count, 3);
        assert_eq!(stats.item_scraped_count, 3);
        assert_eq!(stats.retry_count, 0);

        let mut ids = vec![];
        while let Some(record) = receiver.recv().await {
            ids.push(record.id);
        }
        ids.sort();
        assert_eq!(ids, vec!["tt1", "tt2", "tt3"]);
    }

    #[tokio::test]
    async fn page_without_script_is_retried_then_given_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .expect(3)
            .mount(&server)
            .await;

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let stats = crawler(2).crawl(&seeds(&server, &["/tt1"]), sender).await;

        assert_eq!(stats.response_count, 3);
        assert_eq!(stats.retry_count, 2);
        assert_eq!(stats.retry_reason_count["no movie_data"], 2);
        assert_eq!(stats.retry_max_reached, 1);
        assert_eq!(stats.failure_count[&ErrorKind::MissingDataScript], 1);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn late_script_is_picked_up_on_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(movie_page("tt1", "Heat")))
            .expect(1)
            .mount(&server)
            .await;

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let stats = crawler(2).crawl(&seeds(&server, &["/tt1"]), sender).await;

        assert_eq!(stats.retry_count, 1);
        assert_eq!(stats.item_scraped_count, 1);
        assert_eq!(receiver.recv().await.unwrap().title, "Heat");
    }

    #[tokio::test]
    async fn bad_json_fails_only_that_url() {
        let server = MockServer::start().await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><script id=\"__NEXT_DATA__\">{not json</script></body></html>",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(movie_page("tt2", "Sabrina")))
            .mount(&server)
            .await;

        let (sender, _receiver) = mpsc::unbounded_channel();
        let stats = crawler(2)
            .crawl(&seeds(&server, &["/broken", "/ok"]), sender)
            .await;

        assert_eq!(stats.item_scraped_count, 1);
        assert_eq!(stats.retry_count, 0);
        assert_eq!(stats.failure_count[&ErrorKind::MalformedJson], 1);
    }

    #[tokio::test]
    async fn retryable_status_is_refetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(movie_page("tt3", "Sudden Death")))
            .mount(&server)
            .await;

        let (sender, _receiver) = mpsc::unbounded_channel();
        let stats = crawler(2).crawl(&seeds(&server, &["/tt3"]), sender).await;

        assert_eq!(stats.retry_reason_count["503"], 1);
        assert_eq!(stats.item_scraped_count, 1);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (sender, _receiver) = mpsc::unbounded_channel();
        let stats = crawler(2).crawl(&seeds(&server, &["/gone"]), sender).await;

        assert_eq!(stats.retry_count, 0);
        assert_eq!(stats.failure_count[&ErrorKind::Transport], 1);
    }

    #[tokio::test]
    async fn pauses_overlap_with_a_single_fetch_slot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(movie_page("tt1", "Heat")))
            .expect(3)
            .mount(&server)
            .await;

        let (sender, _receiver) = mpsc::unbounded_channel();
        let started = Instant::now();
        let stats = crawler_with(0, 1, 1)
            .crawl(&seeds(&server, &["/tt1", "/tt2", "/tt3"]), sender)
            .await;
        let elapsed = started.elapsed();

        assert_eq!(stats.item_scraped_count, 3);
        assert!(elapsed >= Duration::from_secs(1));
        assert!(
            elapsed < Duration::from_millis(2500),
            "pauses ran one after another: {:?}",
            elapsed
        );
    }

    async fn exploding_attempt() -> AttemptResult {
        panic!("attempt blew up")
    }

    #[tokio::test]
    async fn panicked_attempt_is_counted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(movie_page("tt1", "Heat")))
            .mount(&server)
            .await;

        let crawler = crawler(0);
        let mut tasks = JoinSet::new();
        crawler.spawn_attempt(&mut tasks, FetchRequest::new(format!("{}/tt1", server.uri())));
        tasks.spawn(exploding_attempt());

        let (sender, _receiver) = mpsc::unbounded_channel();
        let stats = crawler.drain(tasks, sender).await;

        assert_eq!(stats.item_scraped_count, 1);
        assert_eq!(stats.task_panic_count, 1);
        assert_eq!(stats.failures(), 1);
    }
}
