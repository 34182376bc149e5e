use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::args::Args;
use crate::model::Metric;

pub const PROFILE_ENV: &str = "BLOCK_LATENCY_PROFILE";
pub const WORKERS_ENV: &str = "BLOCK_LATENCY_WORKERS";

pub fn default_required_metrics() -> Vec<Metric> {
    Metric::all_in_order().to_vec()
}

/// Metrics surfaced as the stacked average/median breakdown.
pub fn stage_metrics() -> &'static [Metric] {
    &[
        Metric::AnnouncementLatency,
        Metric::BroadcastTime,
        Metric::ProcessingTime,
    ]
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub log_path: PathBuf,
    pub max_blocks: Option<usize>,
    pub output: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub workers: usize,
    pub required_metrics: Vec<Metric>,
    pub profile: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::new(),
            max_blocks: None,
            output: None,
            json: None,
            workers: 1,
            required_metrics: default_required_metrics(),
            profile: false,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl AnalysisConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let required_metrics = match args.require.is_empty() {
            true => default_required_metrics(),
            false => args
                .require
                .iter()
                .map(|s| s.trim().parse::<Metric>().map_err(|e| anyhow!(e)))
                .collect::<Result<Vec<_>>>()?,
        };

        let mut workers = args.jobs.max(1);
        if let Ok(override_workers) = std::env::var(WORKERS_ENV) {
            if let Ok(n) = override_workers.parse::<usize>() {
                workers = n.max(1);
            }
        }

        Ok(Self {
            log_path: args.log_path,
            max_blocks: args.max_blocks,
            output: args.output,
            json: args.json,
            workers,
            required_metrics,
            profile: env_flag(PROFILE_ENV),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_require_list_parses() {
        let args = Args::parse_from([
            "block_latency_rs",
            "-l",
            "logs",
            "--require",
            "broadcast_time,processing_time",
        ]);
        let cfg = AnalysisConfig::from_args(args).unwrap();
        assert_eq!(
            cfg.required_metrics,
            vec![Metric::BroadcastTime, Metric::ProcessingTime]
        );
    }

    #[test]
    fn test_unknown_required_metric_is_rejected() {
        let args = Args::parse_from(["block_latency_rs", "-l", "logs", "--require", "bogus"]);
        assert!(AnalysisConfig::from_args(args).is_err());
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["block_latency_rs", "-l", "logs"]);
        let cfg = AnalysisConfig::from_args(args).unwrap();
        assert_eq!(cfg.required_metrics.len(), 7);
        assert_eq!(cfg.max_blocks, None);
        assert!(cfg.workers >= 1);
    }
}
