//! Event source: turns profiler CSV rows into [`RawEvent`]s.
//!
//! Two row shapes exist in the wild:
//! - `timestamp,block_id,event_kind`
//! - `block_id,timestamp,peer_id,event_kind,sub_phase`
//!
//! Rows matching neither shape are dropped and counted. A timestamp that is
//! not an integer aborts the whole read.

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, trace};
use std::io::Read;

use crate::error::IngestError;
use crate::model::{EventKind, IngestStats, RawEvent, SubPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    ThreeField,
    FiveField,
}

impl RowShape {
    pub fn detect(field_count: usize) -> Option<RowShape> {
        match field_count {
            3 => Some(RowShape::ThreeField),
            5 => Some(RowShape::FiveField),
            _ => None,
        }
    }
}

enum RowOutcome {
    Event(RawEvent),
    Malformed,
    UnknownKind(String),
}

fn parse_timestamp(raw: &str, line: u64) -> Result<i64, IngestError> {
    raw.parse::<i64>().map_err(|_| IngestError::UnparsableTimestamp {
        line,
        value: raw.to_string(),
    })
}

fn resolve_five_field_kind(
    phase: &str,
    sub_phase: Option<SubPhase>,
) -> Result<EventKind, String> {
    if phase != "PROCESSING" {
        let kind: EventKind = phase.parse()?;
        if kind == EventKind::Announcement && sub_phase.is_some() {
            return Err(format!("announcement with sub phase {:?}", sub_phase));
        }
        return Ok(kind);
    }
    match sub_phase {
        Some(SubPhase::Start) => Ok(EventKind::ProcessingStart),
        Some(SubPhase::End) => Ok(EventKind::ProcessingEnd),
        Some(SubPhase::Sync) => Ok(EventKind::ProcessingSync),
        Some(SubPhase::Async) => Ok(EventKind::ProcessingAsync),
        Some(SubPhase::Rejected) => Ok(EventKind::ProcessingRejected),
        None => Err("PROCESSING without sub phase".to_string()),
    }
}

fn parse_row(record: &StringRecord, seq: usize) -> Result<RowOutcome, IngestError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let shape = match RowShape::detect(record.len()) {
        Some(s) => s,
        None => return Ok(RowOutcome::Malformed),
    };

    let event = match shape {
        RowShape::ThreeField => {
            let timestamp = parse_timestamp(&record[0], line)?;
            let kind = match record[2].parse::<EventKind>() {
                Ok(k) => k,
                Err(e) => return Ok(RowOutcome::UnknownKind(e)),
            };
            RawEvent {
                timestamp,
                block_id: record[1].to_string(),
                kind,
                sub_phase: None,
                peer_id: None,
                seq,
            }
        }
        RowShape::FiveField => {
            let timestamp = parse_timestamp(&record[1], line)?;
            let sub_phase = match SubPhase::parse(&record[4]) {
                Ok(s) => s,
                Err(e) => return Ok(RowOutcome::UnknownKind(e)),
            };
            let kind = match resolve_five_field_kind(&record[3], sub_phase) {
                Ok(k) => k,
                Err(e) => return Ok(RowOutcome::UnknownKind(e)),
            };
            let peer_id = match &record[2] {
                "" => None,
                p => Some(p.to_string()),
            };
            RawEvent {
                timestamp,
                block_id: record[0].to_string(),
                kind,
                sub_phase,
                peer_id,
                seq,
            }
        }
    };
    Ok(RowOutcome::Event(event))
}

/// Reads every row from `reader`, appending events to `out`.
///
/// `seq` numbering continues from `out.len()` so several files can feed one
/// stream.
pub fn read_events<R: Read>(
    reader: R,
    out: &mut Vec<RawEvent>,
    stats: &mut IngestStats,
) -> Result<(), IngestError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut record = StringRecord::new();
    while rdr.read_record(&mut record)? {
        // whitespace-only line
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        stats.rows_read += 1;
        match parse_row(&record, out.len())? {
            RowOutcome::Event(ev) => {
                out.push(ev);
                stats.events += 1;
            }
            RowOutcome::Malformed => {
                trace!(
                    "dropping row with {} fields at line {}",
                    record.len(),
                    record.position().map(|p| p.line()).unwrap_or(0)
                );
                stats.malformed_rows += 1;
            }
            RowOutcome::UnknownKind(reason) => {
                debug!(
                    "dropping row at line {}: {}",
                    record.position().map(|p| p.line()).unwrap_or(0),
                    reason
                );
                stats.unknown_kind_rows += 1;
            }
        }
    }
    Ok(())
}

/// Convenience wrapper for in-memory input.
pub fn parse_events(text: &str) -> Result<(Vec<RawEvent>, IngestStats), IngestError> {
    let mut events = Vec::new();
    let mut stats = IngestStats::default();
    read_events(text.as_bytes(), &mut events, &mut stats)?;
    Ok((events, stats))
}
