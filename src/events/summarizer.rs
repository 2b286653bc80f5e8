//! Compression of flag evaluations into per-flag counters.
use std::collections::BTreeMap;

use crate::events::{
    output::{FlagCounter, FlagSummary, SummaryOutput},
    FeatureRequestEvent,
};

/// Accumulates counters for every flag evaluation seen during a flush window.
///
/// Evaluations with the same flag key, version, variation and value share a counter. The default
/// value is kept per flag; if evaluations of the same flag disagree on the default, the last one
/// wins.
#[derive(Debug, Default)]
pub struct EventSummarizer {
    start_date: i64,
    end_date: i64,
    features: BTreeMap<String, FlagSummary>,
}

impl EventSummarizer {
    #[allow(missing_docs)]
    pub fn new() -> EventSummarizer {
        EventSummarizer::default()
    }

    /// Fold a single evaluation created at `creation_date` into the counters.
    pub fn summarize_event(&mut self, event: &FeatureRequestEvent, creation_date: i64) {
        if self.features.is_empty() {
            self.start_date = creation_date;
            self.end_date = creation_date;
        } else {
            self.start_date = self.start_date.min(creation_date);
            self.end_date = self.end_date.max(creation_date);
        }

        let default = event.default.clone().unwrap_or(serde_json::Value::Null);
        let flag = self
            .features
            .entry(event.key.clone())
            .or_insert_with(|| FlagSummary {
                default: serde_json::Value::Null,
                counters: Vec::new(),
            });
        flag.default = default;

        // Counters stay in first-seen order.
        let existing = flag.counters.iter_mut().find(|counter| {
            counter.version == event.version
                && counter.variation == event.variation
                && counter.value == event.value
        });
        match existing {
            Some(counter) => counter.count += 1,
            None => flag.counters.push(FlagCounter {
                version: event.version,
                variation: event.variation,
                value: event.value.clone(),
                count: 1,
                unknown: event.version.is_none(),
            }),
        }
    }

    /// Returns `true` if no evaluation was summarized since the last [`take`](Self::take).
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Return the summary of the window and reset the summarizer.
    ///
    /// Returns `None` if there was no evaluation in the window.
    pub fn take(&mut self) -> Option<SummaryOutput> {
        let summarizer = std::mem::take(self);
        if summarizer.is_empty() {
            return None;
        }
        Some(SummaryOutput {
            start_date: summarizer.start_date,
            end_date: summarizer.end_date,
            features: summarizer.features,
        })
    }
}
