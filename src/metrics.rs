//! Process counters, rendered in the Prometheus text exposition format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    ApiPollSuccess,
    ApiPollFailure,
    ApiDecodeSuccess,
    ApiDecodeFailure,
    StorePutSuccess,
    StorePutFailure,
    StoreGetFailure,
    ScoreChanges,
    PublishFailure,
    StoreMutationsObserved,
}

impl Counter {
    pub const ALL: [Counter; 10] = [
        Counter::ApiPollSuccess,
        Counter::ApiPollFailure,
        Counter::ApiDecodeSuccess,
        Counter::ApiDecodeFailure,
        Counter::StorePutSuccess,
        Counter::StorePutFailure,
        Counter::StoreGetFailure,
        Counter::ScoreChanges,
        Counter::PublishFailure,
        Counter::StoreMutationsObserved,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::ApiPollSuccess => "scorewatch_api_poll_success_total",
            Counter::ApiPollFailure => "scorewatch_api_poll_failure_total",
            Counter::ApiDecodeSuccess => "scorewatch_api_decode_success_total",
            Counter::ApiDecodeFailure => "scorewatch_api_decode_failure_total",
            Counter::StorePutSuccess => "scorewatch_store_put_success_total",
            Counter::StorePutFailure => "scorewatch_store_put_failure_total",
            Counter::StoreGetFailure => "scorewatch_store_get_failure_total",
            Counter::ScoreChanges => "scorewatch_score_changes_total",
            Counter::PublishFailure => "scorewatch_publish_failure_total",
            Counter::StoreMutationsObserved => "scorewatch_store_mutations_observed_total",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Counter::ApiPollSuccess => "Total number of successful API polls",
            Counter::ApiPollFailure => "Total number of failed API polls",
            Counter::ApiDecodeSuccess => "Total number of successful JSON decodes",
            Counter::ApiDecodeFailure => "Total number of failed JSON decodes",
            Counter::StorePutSuccess => "Total number of successful score store puts",
            Counter::StorePutFailure => "Total number of failed score store puts",
            Counter::StoreGetFailure => "Total number of failed score store reads",
            Counter::ScoreChanges => "Total number of score changes detected",
            Counter::PublishFailure => "Total number of score updates that failed to publish",
            Counter::StoreMutationsObserved => "Total number of store mutations seen by the watcher",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Shared counter set, created once in `main` and handed to each component.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: [AtomicU64; Counter::ALL.len()],
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for counter in Counter::ALL {
            let _ = writeln!(out, "# HELP {} {}", counter.name(), counter.help());
            let _ = writeln!(out, "# TYPE {} counter", counter.name());
            let _ = writeln!(out, "{} {}", counter.name(), self.get(counter));
        }
        out
    }
}
