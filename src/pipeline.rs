use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::Instant;

use crate::aggregate::Aggregator;
use crate::config::AnalysisConfig;
use crate::io_utils::{load_events, scan_logs};
use crate::lifecycle::{group_events, resolve_block, validate, BlockEvents};
use crate::metrics::{classify, derive_metrics};
use crate::model::{BlockRecord, IngestStats, Metric, RawEvent};

pub struct Analysis {
    pub ingest: IngestStats,
    pub blocks_seen: usize,
    pub aggregator: Aggregator,
}

/// Resolve, validate and derive one block. `None` for unannounced blocks.
pub fn analyze_block(group: BlockEvents, required: &[Metric]) -> Option<BlockRecord> {
    let lifecycle = resolve_block(group)?;
    let check = validate(&lifecycle);
    let metrics = derive_metrics(&lifecycle, &check);
    let classification = classify(&lifecycle, &check, required);
    Some(BlockRecord {
        ordering_violations: check.violations().len(),
        lifecycle,
        metrics,
        classification,
    })
}

/// Keeps the `n` blocks announced earliest, leaving survivors in their
/// original order.
pub fn limit_to_earliest(records: Vec<BlockRecord>, n: usize) -> Vec<BlockRecord> {
    if records.len() <= n {
        return records;
    }
    let mut order: Vec<(usize, i64)> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (i, r.lifecycle.first_announcement))
        .collect();
    order.sort_by_key(|p| p.1);
    let keep: HashSet<usize> = order.into_iter().take(n).map(|p| p.0).collect();
    let limited: Vec<BlockRecord> = records
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, r)| r)
        .collect();
    info!("Limiting analysis to earliest {} blocks", n);
    limited
}

fn analyze_sequential(groups: Vec<BlockEvents>, required: &[Metric]) -> Vec<BlockRecord> {
    groups
        .into_iter()
        .filter_map(|g| analyze_block(g, required))
        .collect()
}

fn analyze_parallel(
    groups: Vec<BlockEvents>,
    required: &[Metric],
    pool: &rayon::ThreadPool,
) -> Vec<BlockRecord> {
    pool.install(|| {
        groups
            .into_par_iter()
            .filter_map(|g| analyze_block(g, required))
            .collect()
    })
}

fn aggregate(records: Vec<BlockRecord>, pool: Option<&rayon::ThreadPool>) -> Aggregator {
    match pool {
        None => records.into_iter().fold(Aggregator::new(), |mut agg, r| {
            agg.fold(r);
            agg
        }),
        // fold/reduce joins adjacent pieces left to right, so record order holds
        Some(pool) => pool.install(|| {
            records
                .into_par_iter()
                .fold(Aggregator::new, |mut agg, r| {
                    agg.fold(r);
                    agg
                })
                .reduce(Aggregator::new, Aggregator::merge)
        }),
    }
}

/// Runs the in-memory part of the pipeline on an already loaded event set.
pub fn analyze_events(events: Vec<RawEvent>, cfg: &AnalysisConfig) -> Result<(usize, Aggregator)> {
    let t_group = Instant::now();
    let groups = group_events(events);
    let blocks_seen = groups.len();
    if cfg.profile {
        info!("[profile] group events: {:.3}s", t_group.elapsed().as_secs_f64());
    }

    let t_resolve = Instant::now();
    let pool = match cfg.workers {
        1 => None,
        n => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .context("build worker pool")?,
        ),
    };
    let mut records = match &pool {
        None => analyze_sequential(groups, &cfg.required_metrics),
        Some(pool) => analyze_parallel(groups, &cfg.required_metrics, pool),
    };
    debug!(
        "{} of {} blocks were announced",
        records.len(),
        blocks_seen
    );
    if let Some(n) = cfg.max_blocks {
        records = limit_to_earliest(records, n);
    }
    if cfg.profile {
        info!("[profile] resolve/derive: {:.3}s", t_resolve.elapsed().as_secs_f64());
    }

    let t_fold = Instant::now();
    let aggregator = aggregate(records, pool.as_ref());
    if cfg.profile {
        info!("[profile] aggregate: {:.3}s", t_fold.elapsed().as_secs_f64());
    }
    Ok((blocks_seen, aggregator))
}

pub fn run_analysis(cfg: &AnalysisConfig) -> Result<Analysis> {
    let t_load = Instant::now();
    let paths = scan_logs(&cfg.log_path)?;
    let (events, ingest) = load_events(&paths)?;
    if cfg.profile {
        info!("[profile] load logs: {:.3}s", t_load.elapsed().as_secs_f64());
    }
    if ingest.malformed_rows > 0 || ingest.unknown_kind_rows > 0 {
        info!(
            "skipped {} malformed rows and {} rows with unknown event kinds",
            ingest.malformed_rows, ingest.unknown_kind_rows
        );
    }

    let (blocks_seen, aggregator) = analyze_events(events, cfg)?;
    Ok(Analysis {
        ingest,
        blocks_seen,
        aggregator,
    })
}
