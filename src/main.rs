use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::io::BufWriter;
use std::time::Instant;

use block_latency_rs::analyzer::collect_block_scalars;
use block_latency_rs::args::Args;
use block_latency_rs::config::AnalysisConfig;
use block_latency_rs::pipeline::run_analysis;
use block_latency_rs::report::{
    add_block_scalar_rows, add_metric_rows, add_stage_rows, build_table_title, print_counters,
    print_extremes, print_metric_summaries, write_block_metrics_csv, write_json_summary,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let t0 = Instant::now();

    let args = Args::parse();
    if !args.log_path.exists() {
        return Err(anyhow!("log path not found: {}", args.log_path.display()));
    }
    let cfg = AnalysisConfig::from_args(args)?;

    let analysis = run_analysis(&cfg)?;
    let agg = &analysis.aggregator;
    println!("{} blocks seen in log", analysis.blocks_seen);
    println!("{} blocks announced", agg.records().len());

    let t_report = Instant::now();
    print_metric_summaries(agg);
    print_counters(agg.counters(), &analysis.ingest);
    print_extremes(agg.records());

    let scalars = collect_block_scalars(agg.records());
    println!("Announcement window is {:.2} seconds", scalars.duration as f64 / 1000.0);

    let mut table = build_table_title();
    add_metric_rows(&mut table, agg);
    add_stage_rows(&mut table, agg);
    add_block_scalar_rows(&mut table, &scalars);
    table.printstd();

    if let Some(path) = &cfg.output {
        let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        write_block_metrics_csv(agg.records(), BufWriter::new(file))
            .with_context(|| format!("write metrics to {}", path.display()))?;
        println!("Analysis written to {}", path.display());
    }
    if let Some(path) = &cfg.json {
        let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        write_json_summary(agg, &analysis.ingest, analysis.blocks_seen, BufWriter::new(file))
            .with_context(|| format!("write summary to {}", path.display()))?;
        println!("Summary written to {}", path.display());
    }

    if cfg.profile {
        info!("[profile] render report: {:.3}s", t_report.elapsed().as_secs_f64());
        info!("[profile] total main: {:.3}s", t0.elapsed().as_secs_f64());
    }
    Ok(())
}
