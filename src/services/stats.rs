use std::collections::BTreeMap;

use crate::domain::outcome::ErrorKind;

/// Counters collected over one crawl.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    pub response_count: usize,
    pub item_scraped_count: usize,
    pub retry_count: usize,
    pub retry_max_reached: usize,
    pub retry_reason_count: BTreeMap<String, usize>,
    pub failure_count: BTreeMap<ErrorKind, usize>,
    /// Attempts whose task panicked before reporting a result.
    pub task_panic_count: usize,
}

impl RunStats {
    pub fn record_retry(&mut self, reason: &str) {
        self.retry_count += 1;
        *self
            .retry_reason_count
            .entry(reason.to_string())
            .or_default() += 1;
    }

    pub fn record_failure(&mut self, kind: ErrorKind) {
        *self.failure_count.entry(kind).or_default() += 1;
    }

    pub fn failures(&self) -> usize {
        self.failure_count.values().sum::<usize>() + self.task_panic_count
    }

    pub fn log_dump(&self) {
        log::info!("Dumping crawl stats:\n{:#?}", self);
    }
}
