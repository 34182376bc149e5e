use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{BlockRecord, BroadcastBasis, Metric, ProcessingMode};
use crate::stats::{summary_from_samples, Summary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCounters {
    pub total_announcements: usize,
    pub announced: usize,
    pub broadcast_observed: usize,
    pub fully_resolved: usize,
    pub ordering_violations: usize,
    pub broadcast_fallback_samples: usize,
    pub sync_processed: usize,
    pub async_processed: usize,
    pub rejected: usize,
}

impl BlockCounters {
    fn add(&mut self, other: &BlockCounters) {
        self.total_announcements += other.total_announcements;
        self.announced += other.announced;
        self.broadcast_observed += other.broadcast_observed;
        self.fully_resolved += other.fully_resolved;
        self.ordering_violations += other.ordering_violations;
        self.broadcast_fallback_samples += other.broadcast_fallback_samples;
        self.sync_processed += other.sync_processed;
        self.async_processed += other.async_processed;
        self.rejected += other.rejected;
    }
}

/// Running fold over resolved blocks. One per analysis run.
#[derive(Debug, Default)]
pub struct Aggregator {
    samples: BTreeMap<Metric, Vec<i64>>,
    counters: BlockCounters,
    records: Vec<BlockRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, record: BlockRecord) {
        for m in Metric::all_in_order() {
            if let Some(v) = record.metrics.get(*m) {
                self.samples.entry(*m).or_insert_with(Vec::new).push(v);
            }
        }

        let c = &mut self.counters;
        c.total_announcements += record.lifecycle.announcement_count;
        if record.classification.announced {
            c.announced += 1;
        }
        if record.classification.broadcast_observed {
            c.broadcast_observed += 1;
        }
        if record.classification.fully_resolved {
            c.fully_resolved += 1;
        }
        if record.ordering_violations > 0 {
            c.ordering_violations += 1;
        }
        if record.metrics.broadcast_basis == Some(BroadcastBasis::Announcement) {
            c.broadcast_fallback_samples += 1;
        }
        match record.lifecycle.processing_mode {
            Some(ProcessingMode::Sync) => c.sync_processed += 1,
            Some(ProcessingMode::Async) => c.async_processed += 1,
            None => {}
        }
        if record.lifecycle.rejected {
            c.rejected += 1;
        }

        self.records.push(record);
    }

    /// Appends `other` after `self`. Counters add, sample lists concatenate.
    pub fn merge(mut self, other: Aggregator) -> Aggregator {
        for (m, vs) in other.samples {
            self.samples.entry(m).or_insert_with(Vec::new).extend(vs);
        }
        self.counters.add(&other.counters);
        self.records.extend(other.records);
        self
    }

    pub fn samples(&self, m: Metric) -> &[i64] {
        self.samples.get(&m).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn summary(&self, m: Metric) -> Option<Summary> {
        summary_from_samples(self.samples(m))
    }

    pub fn counters(&self) -> &BlockCounters {
        &self.counters
    }

    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockClassification, BlockLifecycle, BlockMetrics};

    fn record(id: &str, total: Option<i64>, fallback: bool) -> BlockRecord {
        BlockRecord {
            lifecycle: BlockLifecycle {
                block_id: id.to_string(),
                announcement_count: 2,
                ..BlockLifecycle::default()
            },
            metrics: BlockMetrics {
                total_lifecycle_time: total,
                broadcast_time: Some(5),
                broadcast_basis: Some(if fallback {
                    BroadcastBasis::Announcement
                } else {
                    BroadcastBasis::ProcessingStart
                }),
                ..BlockMetrics::default()
            },
            classification: BlockClassification {
                announced: true,
                broadcast_observed: true,
                fully_resolved: total.is_some(),
            },
            ordering_violations: 0,
        }
    }

    #[test]
    fn test_fold_collects_present_values_only() {
        let mut agg = Aggregator::new();
        agg.fold(record("a", Some(10), false));
        agg.fold(record("b", None, true));
        agg.fold(record("c", Some(30), false));

        assert_eq!(agg.samples(Metric::TotalLifecycleTime), &[10, 30]);
        assert_eq!(agg.samples(Metric::BroadcastTime).len(), 3);
        assert!(agg.summary(Metric::HeaderValidation).is_none());
        assert_eq!(agg.summary(Metric::TotalLifecycleTime).unwrap().avg, 20.0);

        let c = agg.counters();
        assert_eq!(c.announced, 3);
        assert_eq!(c.fully_resolved, 2);
        assert_eq!(c.total_announcements, 6);
        assert_eq!(c.broadcast_fallback_samples, 1);

        let ids: Vec<&str> = agg.records().iter().map(|r| r.lifecycle.block_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_matches_single_fold() {
        let mut single = Aggregator::new();
        let mut left = Aggregator::new();
        let mut right = Aggregator::new();
        for (i, r) in [record("a", Some(1), false), record("b", Some(7), true), record("c", None, false)]
            .into_iter()
            .enumerate()
        {
            single.fold(r.clone());
            if i < 2 {
                left.fold(r);
            } else {
                right.fold(r);
            }
        }
        let merged = left.merge(right);
        assert_eq!(merged.counters(), single.counters());
        assert_eq!(merged.records(), single.records());
        assert_eq!(
            merged.summary(Metric::TotalLifecycleTime),
            single.summary(Metric::TotalLifecycleTime)
        );
    }
}
