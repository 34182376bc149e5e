use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::aggregate::{Aggregator, BlockCounters};
use crate::analyzer::{find_extremes, short_id, BlockScalars};
use crate::config::stage_metrics;
use crate::error::ExportError;
use crate::model::{BlockRecord, BroadcastBasis, IngestStats, Metric};
use crate::stats::{summary_from_samples, Summary};

/// Marker written for an absent metric value.
pub const NULL_MARKER: &str = "null";
const BASIS_COLUMN: &str = "broadcast_basis";

pub fn summary_line(label: &str, summary: Option<&Summary>) -> String {
    match summary {
        Some(s) => format!("{}: avg={:.2}ms, med={:.2}ms", label, s.avg, s.median),
        None => format!("{}: no data", label),
    }
}

pub fn print_metric_summaries(agg: &Aggregator) {
    println!("\n--- Overall Metrics ---\n");
    for m in Metric::all_in_order() {
        if *m == Metric::TotalLifecycleTime {
            println!("\n-----------------------\n");
        }
        println!("{}", summary_line(m.label(), agg.summary(*m).as_ref()));
        if *m == Metric::BroadcastTime && agg.counters().broadcast_fallback_samples > 0 {
            println!(
                "  ({} of {} samples measured from first announcement: processing start missing, lower fidelity)",
                agg.counters().broadcast_fallback_samples,
                agg.samples(Metric::BroadcastTime).len()
            );
        }
    }
    println!("\n-----------------------\n");
}

pub fn print_counters(counters: &BlockCounters, ingest: &IngestStats) {
    println!("Total Announcements: {}", counters.total_announcements);
    println!("Blocks Announced: {}", counters.announced);
    println!("Blocks Broadcasted: {}", counters.broadcast_observed);
    println!("Blocks Fully Resolved: {}", counters.fully_resolved);
    println!("Blocks With Ordering Violations: {}", counters.ordering_violations);
    println!(
        "Processing Mode: sync={}, async={}, rejected={}",
        counters.sync_processed, counters.async_processed, counters.rejected
    );
    println!(
        "Rows: read={}, events={}, malformed={}, unknown kind={}",
        ingest.rows_read, ingest.events, ingest.malformed_rows, ingest.unknown_kind_rows
    );
}

/// Mini tables for the fastest and slowest blocks by lifecycle and broadcast time.
pub fn print_extremes(records: &[BlockRecord]) {
    for (metric, what) in [
        (Metric::TotalLifecycleTime, "Propagated"),
        (Metric::BroadcastTime, "Broadcasted"),
    ] {
        let Some(e) = find_extremes(records, metric) else {
            continue;
        };
        for (title, r) in [("Fastest", e.fastest), ("Slowest", e.slowest)] {
            let heading = format!("{} {} Block", title, what);
            println!();
            println!("{}", heading);
            println!("{}", "-".repeat(heading.len()));
            println!("Block Hash: {}...", short_id(&r.lifecycle.block_id));
            println!("Lifecycle Time: {}", fmt_opt(r.metrics.total_lifecycle_time, " ms"));
            println!("Broadcast Time: {}", fmt_opt(r.metrics.broadcast_time, " ms"));
            println!("Announcements: {}", r.lifecycle.announcement_count);
        }
    }
    println!();
}

fn fmt_opt(v: Option<i64>, unit: &str) -> String {
    match v {
        Some(v) => format!("{}{}", v, unit),
        None => "n/a".to_string(),
    }
}

pub fn build_table_title() -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("name"),
        Cell::new("Avg"),
        Cell::new("Median"),
        Cell::new("Min"),
        Cell::new("P90"),
        Cell::new("Max"),
        Cell::new("Cnt"),
    ]));
    table
}

pub fn add_metric_rows(table: &mut Table, agg: &Aggregator) {
    for m in Metric::all_in_order() {
        table.add_row(row_from_summary(m.name(), agg.summary(*m), true));
    }
}

/// Stacked average/median breakdown of the main lifecycle stages.
pub fn add_stage_rows(table: &mut Table, agg: &Aggregator) {
    let mut avg_total = 0.0;
    let mut med_total = 0.0;
    for m in stage_metrics() {
        if let Some(s) = agg.summary(*m) {
            avg_total += s.avg;
            med_total += s.median;
        }
    }
    if avg_total == 0.0 && med_total == 0.0 {
        return;
    }
    for m in stage_metrics() {
        let (avg, med) = agg.summary(*m).map(|s| (s.avg, s.median)).unwrap_or((0.0, 0.0));
        table.add_row(Row::new(vec![
            Cell::new(&format!("share of stages ({})", m.name())),
            Cell::new(&share(avg, avg_total)),
            Cell::new(&share(med, med_total)),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
        ]));
    }
}

fn share(part: f64, total: f64) -> String {
    match total == 0.0 {
        true => "nan".to_string(),
        false => format!("{:.1}%", part / total * 100.0),
    }
}

pub fn add_block_scalar_rows(table: &mut Table, scalars: &BlockScalars) {
    table.add_row(row_from_summary(
        "announcements per block",
        summary_from_samples(&scalars.announcements),
        false,
    ));
    table.add_row(row_from_summary(
        "peers per block",
        summary_from_samples(&scalars.peers),
        false,
    ));
    table.add_row(row_from_summary(
        "block announcement interval",
        summary_from_samples(&scalars.intervals),
        true,
    ));
}

fn row_from_summary(name: &str, s: Option<Summary>, fixed: bool) -> Row {
    let f = |v: f64| -> String {
        if fixed || (v - v.round()).abs() >= 1e-9 {
            format!("{:.2}", v)
        } else {
            format!("{}", v as i64)
        }
    };

    match s {
        Some(s) => Row::new(vec![
            Cell::new(name),
            Cell::new(&f(s.avg)),
            Cell::new(&f(s.median)),
            Cell::new(&f(s.min)),
            Cell::new(&f(s.p90)),
            Cell::new(&f(s.max)),
            Cell::new(&format!("{}", s.cnt)),
        ]),
        None => Row::new(vec![
            Cell::new(name),
            Cell::new("no data"),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new("0"),
        ]),
    }
}

fn export_header() -> Vec<&'static str> {
    let mut header = vec!["block_id"];
    header.extend(Metric::all_in_order().iter().map(|m| m.name()));
    header.push(BASIS_COLUMN);
    header
}

/// One row per resolved block, in resolution order.
pub fn write_block_metrics_csv<W: Write>(
    records: &[BlockRecord],
    writer: W,
) -> Result<(), ExportError> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(export_header())?;
    for r in records {
        let mut row: Vec<String> = Vec::with_capacity(Metric::all_in_order().len() + 2);
        row.push(r.lifecycle.block_id.clone());
        for m in Metric::all_in_order() {
            row.push(match r.metrics.get(*m) {
                Some(v) => v.to_string(),
                None => NULL_MARKER.to_string(),
            });
        }
        row.push(match r.metrics.broadcast_basis {
            Some(b) => b.name().to_string(),
            None => NULL_MARKER.to_string(),
        });
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportedSamples {
    pub samples: BTreeMap<Metric, Vec<i64>>,
    pub broadcast_fallback_samples: usize,
    pub blocks: usize,
}

impl ExportedSamples {
    pub fn summary(&self, m: Metric) -> Option<Summary> {
        summary_from_samples(self.samples.get(&m).map(Vec::as_slice).unwrap_or(&[]))
    }
}

/// Rebuilds per-metric sample lists from a metrics export.
pub fn read_block_metrics_csv<R: Read>(reader: R) -> Result<ExportedSamples, ExportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &'static str| -> Result<usize, ExportError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(ExportError::MissingColumn(name))
    };

    let mut metric_columns = Vec::new();
    for m in Metric::all_in_order() {
        metric_columns.push((*m, column(m.name())?));
    }
    let basis_column = headers.iter().position(|h| h == BASIS_COLUMN);

    let mut out = ExportedSamples::default();
    for row in rdr.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        out.blocks += 1;
        for (m, idx) in &metric_columns {
            let raw = row.get(*idx).unwrap_or(NULL_MARKER);
            if raw == NULL_MARKER {
                continue;
            }
            let v = raw.parse::<i64>().map_err(|_| ExportError::BadValue {
                line,
                column: m.name(),
                value: raw.to_string(),
            })?;
            out.samples.entry(*m).or_insert_with(Vec::new).push(v);
        }
        if let Some(idx) = basis_column {
            let raw = row.get(idx).unwrap_or(NULL_MARKER);
            if raw != NULL_MARKER {
                let basis = raw.parse::<BroadcastBasis>().map_err(|_| ExportError::BadValue {
                    line,
                    column: BASIS_COLUMN,
                    value: raw.to_string(),
                })?;
                if basis == BroadcastBasis::Announcement {
                    out.broadcast_fallback_samples += 1;
                }
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Serialize)]
pub struct MetricSummaryJson {
    pub metric: Metric,
    pub summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
pub struct JsonSummary<'a> {
    pub blocks_seen: usize,
    pub ingest: &'a IngestStats,
    pub counters: &'a BlockCounters,
    pub metrics: Vec<MetricSummaryJson>,
}

pub fn write_json_summary<W: Write>(
    agg: &Aggregator,
    ingest: &IngestStats,
    blocks_seen: usize,
    writer: W,
) -> Result<(), serde_json::Error> {
    let summary = JsonSummary {
        blocks_seen,
        ingest,
        counters: agg.counters(),
        metrics: Metric::all_in_order()
            .iter()
            .map(|m| MetricSummaryJson {
                metric: *m,
                summary: agg.summary(*m),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::ingest::parse_events;
    use crate::pipeline::analyze_events;

    fn aggregator() -> Aggregator {
        let (events, _) = parse_events(
            "\
100,B1,ANOUNCEMENT
150,B1,PROCESSING_START
400,B1,BROADCASTED
500,B1,PROCESSING_END
10,B2,ANOUNCEMENT
20,B2,BROADCASTED
",
        )
        .unwrap();
        analyze_events(events, &AnalysisConfig::default()).unwrap().1
    }

    #[test]
    fn test_summary_line_formats() {
        let s = summary_from_samples(&[1, 2]).unwrap();
        assert_eq!(summary_line("X", Some(&s)), "X: avg=1.50ms, med=1.50ms");
        assert_eq!(summary_line("X", None), "X: no data");
    }

    #[test]
    fn test_export_uses_null_marker() {
        let agg = aggregator();
        let mut buf = Vec::new();
        write_block_metrics_csv(agg.records(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "block_id,announcement_latency,header_validation,contained_validation,preprocessing,broadcast_time,processing_time,total_lifecycle_time,broadcast_basis"
        );
        assert_eq!(lines[1], "B1,50,null,null,null,250,100,400,processing_start");
        assert_eq!(lines[2], "B2,null,null,null,null,10,null,null,announcement");
    }

    #[test]
    fn test_export_round_trip_reproduces_summaries() {
        let agg = aggregator();
        let mut buf = Vec::new();
        write_block_metrics_csv(agg.records(), &mut buf).unwrap();
        let back = read_block_metrics_csv(buf.as_slice()).unwrap();
        assert_eq!(back.blocks, 2);
        assert_eq!(back.broadcast_fallback_samples, 1);
        for m in Metric::all_in_order() {
            assert_eq!(back.summary(*m), agg.summary(*m));
        }
    }

    #[test]
    fn test_read_rejects_bad_value() {
        let text = "block_id,announcement_latency,header_validation,contained_validation,preprocessing,broadcast_time,processing_time,total_lifecycle_time\nB1,x,null,null,null,null,null,null\n";
        match read_block_metrics_csv(text.as_bytes()) {
            Err(ExportError::BadValue { column, .. }) => assert_eq!(column, "announcement_latency"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_json_summary_has_no_data_as_null() {
        let agg = aggregator();
        let mut buf = Vec::new();
        write_json_summary(&agg, &IngestStats::default(), 2, &mut buf).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["counters"]["announced"], 2);
        assert_eq!(v["metrics"][0]["metric"], "announcement_latency");
        assert_eq!(v["metrics"][0]["summary"]["avg"], 50.0);
        assert!(v["metrics"][1]["summary"].is_null());
    }

    #[test]
    fn test_table_has_row_per_metric() {
        let agg = aggregator();
        let mut table = build_table_title();
        add_metric_rows(&mut table, &agg);
        assert_eq!(table.len(), Metric::all_in_order().len());
    }
}
