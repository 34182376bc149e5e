use crate::model::{BlockRecord, Metric};

#[derive(Debug, Default)]
pub struct BlockScalars {
    pub announcements: Vec<i64>,
    pub peers: Vec<i64>,
    pub intervals: Vec<i64>,
    pub duration: i64,
}

/// Per-block scalars that are not intervals inside a lifecycle.
pub fn collect_block_scalars(records: &[BlockRecord]) -> BlockScalars {
    let mut announcements = Vec::with_capacity(records.len());
    let mut peers = Vec::new();
    let mut first_seen: Vec<i64> = Vec::with_capacity(records.len());

    for r in records {
        announcements.push(r.lifecycle.announcement_count as i64);
        if r.lifecycle.peer_count > 0 {
            peers.push(r.lifecycle.peer_count as i64);
        }
        first_seen.push(r.lifecycle.first_announcement);
    }

    first_seen.sort();
    let intervals: Vec<i64> = first_seen.windows(2).map(|w| w[1] - w[0]).collect();
    let duration = match (first_seen.first(), first_seen.last()) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0,
    };

    BlockScalars {
        announcements,
        peers,
        intervals,
        duration,
    }
}

#[derive(Debug)]
pub struct Extremes<'a> {
    pub fastest: &'a BlockRecord,
    pub slowest: &'a BlockRecord,
}

/// Fastest and slowest block for `metric`. Ties go to the earlier block.
pub fn find_extremes(records: &[BlockRecord], metric: Metric) -> Option<Extremes<'_>> {
    let mut fastest: Option<(&BlockRecord, i64)> = None;
    let mut slowest: Option<(&BlockRecord, i64)> = None;

    for r in records {
        let v = match r.metrics.get(metric) {
            Some(v) => v,
            None => continue,
        };
        match fastest {
            Some((_, cur)) if v >= cur => {}
            _ => fastest = Some((r, v)),
        }
        match slowest {
            Some((_, cur)) if v <= cur => {}
            _ => slowest = Some((r, v)),
        }
    }

    Some(Extremes {
        fastest: fastest?.0,
        slowest: slowest?.0,
    })
}

pub fn short_id(block_id: &str) -> &str {
    match block_id.char_indices().nth(8) {
        Some((i, _)) => &block_id[..i],
        None => block_id,
    }
}
