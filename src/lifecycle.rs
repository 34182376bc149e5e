//! Block lifecycle reconstruction: grouping, milestone resolution and
//! ordering validation.

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::model::{BlockLifecycle, EventKind, Milestone, ProcessingMode, RawEvent, SubPhase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvents {
    pub block_id: String,
    pub events: Vec<RawEvent>,
}

/// Buckets events per block, each bucket sorted by timestamp.
///
/// Buckets come out in order of first appearance. Events sharing a timestamp
/// are ordered by input position.
pub fn group_events(events: Vec<RawEvent>) -> Vec<BlockEvents> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<BlockEvents> = Vec::new();

    for ev in events {
        match index.get(&ev.block_id) {
            Some(&i) => groups[i].events.push(ev),
            None => {
                index.insert(ev.block_id.clone(), groups.len());
                groups.push(BlockEvents {
                    block_id: ev.block_id.clone(),
                    events: vec![ev],
                });
            }
        }
    }

    for g in &mut groups {
        g.events.sort_by_key(|e| (e.timestamp, e.seq));
    }
    groups
}

fn set_first(slot: &mut Option<i64>, t: i64) {
    if slot.is_none() {
        *slot = Some(t);
    }
}

/// Reduces one block's sorted events to its milestone record.
///
/// Returns `None` when the block was never announced.
pub fn resolve_block(group: BlockEvents) -> Option<BlockLifecycle> {
    let mut announcements: Vec<i64> = Vec::new();
    let mut lc = BlockLifecycle {
        block_id: group.block_id,
        ..BlockLifecycle::default()
    };
    let mut peers: HashSet<String> = HashSet::new();

    for ev in group.events {
        match ev.kind {
            EventKind::Announcement => announcements.push(ev.timestamp),
            EventKind::ProcessingStart => set_first(&mut lc.processing_start, ev.timestamp),
            EventKind::ProcessingEnd => set_first(&mut lc.processing_end, ev.timestamp),
            EventKind::ValidationHeader => set_first(&mut lc.validation_header, ev.timestamp),
            EventKind::ValidationContained => {
                set_first(&mut lc.validation_contained, ev.timestamp)
            }
            EventKind::ValidationPreprocessStart => {
                set_first(&mut lc.preprocess_start, ev.timestamp)
            }
            EventKind::ValidationPreprocessEnd => set_first(&mut lc.preprocess_end, ev.timestamp),
            EventKind::Broadcasted => set_first(&mut lc.broadcasted, ev.timestamp),
            EventKind::ProcessingSync | EventKind::ProcessingAsync | EventKind::ProcessingRejected => {}
        }

        let mode = match (ev.kind, ev.sub_phase) {
            (EventKind::ProcessingSync, _) | (_, Some(SubPhase::Sync)) => Some(ProcessingMode::Sync),
            (EventKind::ProcessingAsync, _) | (_, Some(SubPhase::Async)) => {
                Some(ProcessingMode::Async)
            }
            _ => None,
        };
        if lc.processing_mode.is_none() {
            lc.processing_mode = mode;
        }
        if ev.kind == EventKind::ProcessingRejected || ev.sub_phase == Some(SubPhase::Rejected) {
            lc.rejected = true;
        }
        if let Some(p) = ev.peer_id {
            peers.insert(p);
        }
    }

    lc.first_announcement = announcements.iter().copied().min()?;
    lc.announcement_count = announcements.len();
    lc.peer_count = peers.len();
    Some(lc)
}

/// Result of checking `first_announcement <= processing_start <= broadcasted
/// <= processing_end` over the milestones that resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderingCheck {
    chain: [Option<i64>; 4],
    violations: Vec<(Milestone, Milestone)>,
}

impl OrderingCheck {
    pub fn violations(&self) -> &[(Milestone, Milestone)] {
        &self.violations
    }

    /// Whether the present milestones between `from` and `to` (inclusive,
    /// both chain members) are in order. Milestones outside the span do not
    /// matter.
    pub fn span_is_ordered(&self, from: Milestone, to: Milestone) -> bool {
        let (lo, hi) = match (from.chain_position(), to.chain_position()) {
            (Some(a), Some(b)) if a <= b => (a, b),
            _ => return false,
        };
        let present: Vec<i64> = self.chain[lo..=hi].iter().flatten().copied().collect();
        present.windows(2).all(|w| w[0] <= w[1])
    }
}

pub fn validate(lc: &BlockLifecycle) -> OrderingCheck {
    let chain = Milestone::chain();
    let mut values = [None; 4];
    for (i, m) in chain.iter().enumerate() {
        values[i] = lc.milestone(*m);
    }

    let present: Vec<(Milestone, i64)> = chain
        .iter()
        .zip(values.iter())
        .filter_map(|(m, v)| v.map(|t| (*m, t)))
        .collect();

    let mut violations = Vec::new();
    for w in present.windows(2) {
        let ((ma, ta), (mb, tb)) = (w[0], w[1]);
        if ta > tb {
            debug!(
                "block {}: {} ({}) after {} ({})",
                lc.block_id,
                ma.name(),
                ta,
                mb.name(),
                tb
            );
            violations.push((ma, mb));
        }
    }

    OrderingCheck {
        chain: values,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: i64, block: &str, kind: EventKind, seq: usize) -> RawEvent {
        RawEvent {
            timestamp: t,
            block_id: block.to_string(),
            kind,
            sub_phase: None,
            peer_id: None,
            seq,
        }
    }

    fn single_block(events: Vec<RawEvent>) -> BlockLifecycle {
        let mut groups = group_events(events);
        assert_eq!(groups.len(), 1);
        resolve_block(groups.remove(0)).unwrap()
    }

    #[test]
    fn test_group_preserves_first_appearance_and_sorts() {
        let groups = group_events(vec![
            ev(30, "B2", EventKind::Announcement, 0),
            ev(20, "B1", EventKind::Broadcasted, 1),
            ev(10, "B1", EventKind::Announcement, 2),
            ev(5, "B2", EventKind::ProcessingStart, 3),
        ]);
        assert_eq!(groups[0].block_id, "B2");
        assert_eq!(groups[1].block_id, "B1");
        let ts: Vec<i64> = groups[1].events.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![10, 20]);
        assert_eq!(groups[0].events[0].timestamp, 5);
    }

    #[test]
    fn test_group_is_stable_on_ties() {
        let groups = group_events(vec![
            ev(10, "B1", EventKind::Broadcasted, 0),
            ev(10, "B1", EventKind::Announcement, 1),
            ev(10, "B1", EventKind::ProcessingStart, 2),
        ]);
        let seqs: Vec<usize> = groups[0].events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_follow_input_position_not_vec_order() {
        let lc = single_block(vec![
            ev(10, "B1", EventKind::Announcement, 0),
            ev(12, "B1", EventKind::ProcessingAsync, 3),
            ev(12, "B1", EventKind::ProcessingSync, 2),
        ]);
        assert_eq!(lc.processing_mode, Some(ProcessingMode::Sync));
    }

    #[test]
    fn test_first_announcement_is_minimum() {
        let lc = single_block(vec![
            ev(5, "B1", EventKind::Announcement, 0),
            ev(3, "B1", EventKind::Announcement, 1),
        ]);
        assert_eq!(lc.first_announcement, 3);
        assert_eq!(lc.announcement_count, 2);
    }

    #[test]
    fn test_duplicate_announcements_all_count() {
        let lc = single_block(vec![
            ev(7, "B1", EventKind::Announcement, 0),
            ev(7, "B1", EventKind::Announcement, 1),
            ev(7, "B1", EventKind::Announcement, 2),
        ]);
        assert_eq!(lc.announcement_count, 3);
    }

    #[test]
    fn test_first_occurrence_wins_regardless_of_input_order() {
        let lc = single_block(vec![
            ev(1, "B1", EventKind::Announcement, 0),
            ev(40, "B1", EventKind::Broadcasted, 1),
            ev(20, "B1", EventKind::Broadcasted, 2),
            ev(30, "B1", EventKind::ProcessingStart, 3),
            ev(25, "B1", EventKind::ProcessingStart, 4),
        ]);
        assert_eq!(lc.broadcasted, Some(20));
        assert_eq!(lc.processing_start, Some(25));
    }

    #[test]
    fn test_no_announcement_yields_nothing() {
        let mut groups = group_events(vec![
            ev(10, "B1", EventKind::ProcessingStart, 0),
            ev(20, "B1", EventKind::Broadcasted, 1),
        ]);
        assert!(resolve_block(groups.remove(0)).is_none());
    }

    #[test]
    fn test_partial_block_keeps_nulls() {
        let lc = single_block(vec![
            ev(10, "B1", EventKind::Announcement, 0),
            ev(20, "B1", EventKind::Broadcasted, 1),
        ]);
        assert_eq!(lc.broadcasted, Some(20));
        assert_eq!(lc.processing_start, None);
        assert_eq!(lc.processing_end, None);
        assert_eq!(lc.validation_header, None);
    }

    #[test]
    fn test_processing_markers_are_informational() {
        let mut events = vec![
            ev(10, "B1", EventKind::Announcement, 0),
            ev(11, "B1", EventKind::ProcessingStart, 1),
            ev(12, "B1", EventKind::ProcessingAsync, 2),
            ev(13, "B1", EventKind::ProcessingSync, 3),
            ev(14, "B1", EventKind::ProcessingRejected, 4),
        ];
        events[0].peer_id = Some("p1".to_string());
        events[1].peer_id = Some("p2".to_string());
        events[2].peer_id = Some("p1".to_string());
        let lc = single_block(events);
        assert_eq!(lc.processing_mode, Some(ProcessingMode::Async));
        assert!(lc.rejected);
        assert_eq!(lc.peer_count, 2);
        assert_eq!(lc.processing_start, Some(11));
        assert_eq!(lc.processing_end, None);
    }

    #[test]
    fn test_validate_ordered_chain() {
        let lc = BlockLifecycle {
            block_id: "B1".to_string(),
            first_announcement: 100,
            announcement_count: 1,
            processing_start: Some(150),
            broadcasted: Some(400),
            processing_end: Some(500),
            ..BlockLifecycle::default()
        };
        let check = validate(&lc);
        assert!(check.violations().is_empty());
        assert!(check.span_is_ordered(Milestone::FirstAnnouncement, Milestone::ProcessingEnd));
    }

    #[test]
    fn test_validate_skips_absent_milestones() {
        let lc = BlockLifecycle {
            block_id: "B1".to_string(),
            first_announcement: 100,
            announcement_count: 1,
            broadcasted: Some(90),
            processing_end: Some(500),
            ..BlockLifecycle::default()
        };
        let check = validate(&lc);
        assert_eq!(
            check.violations(),
            &[(Milestone::FirstAnnouncement, Milestone::Broadcasted)]
        );
        assert!(check.span_is_ordered(Milestone::Broadcasted, Milestone::ProcessingEnd));
        assert!(!check.span_is_ordered(Milestone::FirstAnnouncement, Milestone::Broadcasted));
        assert!(!check.span_is_ordered(Milestone::FirstAnnouncement, Milestone::ProcessingEnd));
    }

    #[test]
    fn test_violation_is_local_to_its_span() {
        let lc = BlockLifecycle {
            block_id: "B1".to_string(),
            first_announcement: 100,
            announcement_count: 1,
            processing_start: Some(90),
            broadcasted: Some(120),
            processing_end: Some(130),
            ..BlockLifecycle::default()
        };
        let check = validate(&lc);
        assert!(!check.violations().is_empty());
        assert!(!check.span_is_ordered(Milestone::FirstAnnouncement, Milestone::ProcessingStart));
        assert!(check.span_is_ordered(Milestone::ProcessingStart, Milestone::Broadcasted));
        assert!(check.span_is_ordered(Milestone::Broadcasted, Milestone::ProcessingEnd));
    }
}
