use crate::lifecycle::OrderingCheck;
use crate::model::{
    BlockClassification, BlockLifecycle, BlockMetrics, BroadcastBasis, Metric, Milestone,
};

fn interval(from: Option<i64>, to: Option<i64>) -> Option<i64> {
    Some(to? - from?)
}

/// Interval between two chain milestones, dropped when the span between
/// them is out of order.
fn chained_interval(
    lc: &BlockLifecycle,
    check: &OrderingCheck,
    from: Milestone,
    to: Milestone,
) -> Option<i64> {
    let v = interval(lc.milestone(from), lc.milestone(to))?;
    check.span_is_ordered(from, to).then_some(v)
}

fn broadcast_time(lc: &BlockLifecycle, check: &OrderingCheck) -> Option<(i64, BroadcastBasis)> {
    let broadcasted = lc.broadcasted?;
    let (base, basis) = match lc.processing_start {
        Some(ps) => (ps, BroadcastBasis::ProcessingStart),
        None => (lc.first_announcement, BroadcastBasis::Announcement),
    };
    let from = match basis {
        BroadcastBasis::ProcessingStart => Milestone::ProcessingStart,
        BroadcastBasis::Announcement => Milestone::FirstAnnouncement,
    };
    check
        .span_is_ordered(from, Milestone::Broadcasted)
        .then_some((broadcasted - base, basis))
}

/// Derives every interval metric whose endpoints resolved. Negative values
/// pass through untouched.
pub fn derive_metrics(lc: &BlockLifecycle, check: &OrderingCheck) -> BlockMetrics {
    use Milestone::*;

    let broadcast = broadcast_time(lc, check);
    BlockMetrics {
        announcement_latency: chained_interval(lc, check, FirstAnnouncement, ProcessingStart),
        header_validation: interval(lc.validation_header, lc.validation_contained),
        contained_validation: interval(lc.validation_contained, lc.preprocess_start),
        preprocessing: interval(lc.preprocess_start, lc.preprocess_end),
        broadcast_time: broadcast.map(|(v, _)| v),
        broadcast_basis: broadcast.map(|(_, b)| b),
        processing_time: chained_interval(lc, check, Broadcasted, ProcessingEnd),
        total_lifecycle_time: chained_interval(lc, check, FirstAnnouncement, ProcessingEnd),
    }
}

/// A block is fully resolved when every milestone the requested metrics need
/// is present and the chain among those milestones is ordered.
pub fn classify(
    lc: &BlockLifecycle,
    check: &OrderingCheck,
    requested: &[Metric],
) -> BlockClassification {
    let mut required: Vec<Milestone> = requested
        .iter()
        .flat_map(|m| m.prerequisites())
        .collect();
    required.sort();
    required.dedup();

    let all_present = required.iter().all(|m| lc.milestone(*m).is_some());
    let chained: Vec<Milestone> = required
        .iter()
        .copied()
        .filter(|m| m.chain_position().is_some())
        .collect();
    let ordered = match (chained.first(), chained.last()) {
        (Some(from), Some(to)) => check.span_is_ordered(*from, *to),
        _ => true,
    };

    BlockClassification {
        announced: true,
        broadcast_observed: lc.broadcasted.is_some(),
        fully_resolved: all_present && ordered,
    }
}
