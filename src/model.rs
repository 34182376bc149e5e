use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Announcement,
    ProcessingStart,
    ProcessingEnd,
    ValidationHeader,
    ValidationContained,
    ValidationPreprocessStart,
    ValidationPreprocessEnd,
    Broadcasted,
    ProcessingSync,
    ProcessingAsync,
    ProcessingRejected,
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // the profiler writes the misspelled form
            "ANOUNCEMENT" | "ANNOUNCEMENT" => Ok(EventKind::Announcement),
            "PROCESSING_START" => Ok(EventKind::ProcessingStart),
            "PROCESSING_END" => Ok(EventKind::ProcessingEnd),
            "VALIDATION_BLOCK_HEADER" | "VALIDATION_HEADER" => Ok(EventKind::ValidationHeader),
            "VALIDATION_BLOCK_CONTAINED" | "VALIDATION_CONTAINED" => {
                Ok(EventKind::ValidationContained)
            }
            "VALIDATION_PREPROCESS_START" => Ok(EventKind::ValidationPreprocessStart),
            "VALIDATION_PREPROCESS_END" => Ok(EventKind::ValidationPreprocessEnd),
            "BROADCASTED" => Ok(EventKind::Broadcasted),
            "PROCESSING_SYNC" => Ok(EventKind::ProcessingSync),
            "PROCESSING_ASYNC" => Ok(EventKind::ProcessingAsync),
            "PROCESSING_REJECTED" => Ok(EventKind::ProcessingRejected),
            other => Err(format!("unknown event kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubPhase {
    Start,
    End,
    Sync,
    Async,
    Rejected,
}

impl SubPhase {
    /// `NONE` parses to `Ok(None)`.
    pub fn parse(s: &str) -> Result<Option<SubPhase>, String> {
        match s {
            "NONE" | "" => Ok(None),
            "START" => Ok(Some(SubPhase::Start)),
            "END" => Ok(Some(SubPhase::End)),
            "SYNC" => Ok(Some(SubPhase::Sync)),
            "ASYNC" => Ok(Some(SubPhase::Async)),
            "REJECTED" => Ok(Some(SubPhase::Rejected)),
            other => Err(format!("unknown sub phase '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub timestamp: i64,
    pub block_id: String,
    pub kind: EventKind,
    pub sub_phase: Option<SubPhase>,
    pub peer_id: Option<String>,
    /// Position in the input stream, used as the tie-breaker when sorting.
    pub seq: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingMode {
    Sync,
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockLifecycle {
    pub block_id: String,
    pub first_announcement: i64,
    pub announcement_count: usize,
    pub processing_start: Option<i64>,
    pub processing_end: Option<i64>,
    pub validation_header: Option<i64>,
    pub validation_contained: Option<i64>,
    pub preprocess_start: Option<i64>,
    pub preprocess_end: Option<i64>,
    pub broadcasted: Option<i64>,
    pub processing_mode: Option<ProcessingMode>,
    pub rejected: bool,
    pub peer_count: usize,
}

impl BlockLifecycle {
    pub fn milestone(&self, m: Milestone) -> Option<i64> {
        match m {
            Milestone::FirstAnnouncement => Some(self.first_announcement),
            Milestone::ProcessingStart => self.processing_start,
            Milestone::Broadcasted => self.broadcasted,
            Milestone::ProcessingEnd => self.processing_end,
            Milestone::ValidationHeader => self.validation_header,
            Milestone::ValidationContained => self.validation_contained,
            Milestone::PreprocessStart => self.preprocess_start,
            Milestone::PreprocessEnd => self.preprocess_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Milestone {
    FirstAnnouncement,
    ProcessingStart,
    Broadcasted,
    ProcessingEnd,
    ValidationHeader,
    ValidationContained,
    PreprocessStart,
    PreprocessEnd,
}

impl Milestone {
    /// The ordered chain checked by the validator.
    pub fn chain() -> &'static [Milestone] {
        use Milestone::*;
        &[FirstAnnouncement, ProcessingStart, Broadcasted, ProcessingEnd]
    }

    pub fn chain_position(self) -> Option<usize> {
        Milestone::chain().iter().position(|m| *m == self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Milestone::FirstAnnouncement => "first_announcement",
            Milestone::ProcessingStart => "processing_start",
            Milestone::Broadcasted => "broadcasted",
            Milestone::ProcessingEnd => "processing_end",
            Milestone::ValidationHeader => "validation_header",
            Milestone::ValidationContained => "validation_contained",
            Milestone::PreprocessStart => "preprocess_start",
            Milestone::PreprocessEnd => "preprocess_end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AnnouncementLatency,
    HeaderValidation,
    ContainedValidation,
    Preprocessing,
    BroadcastTime,
    ProcessingTime,
    TotalLifecycleTime,
}

impl Metric {
    pub fn all_in_order() -> &'static [Metric] {
        use Metric::*;
        &[
            AnnouncementLatency,
            HeaderValidation,
            ContainedValidation,
            Preprocessing,
            BroadcastTime,
            ProcessingTime,
            TotalLifecycleTime,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::AnnouncementLatency => "announcement_latency",
            Metric::HeaderValidation => "header_validation",
            Metric::ContainedValidation => "contained_validation",
            Metric::Preprocessing => "preprocessing",
            Metric::BroadcastTime => "broadcast_time",
            Metric::ProcessingTime => "processing_time",
            Metric::TotalLifecycleTime => "total_lifecycle_time",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::AnnouncementLatency => "Announcement Latency",
            Metric::HeaderValidation => "Header Validation",
            Metric::ContainedValidation => "Contained Validation",
            Metric::Preprocessing => "Preprocessing",
            Metric::BroadcastTime => "Broadcast Time",
            Metric::ProcessingTime => "Processing Time",
            Metric::TotalLifecycleTime => "Total Lifecycle Time",
        }
    }

    /// Milestones that must resolve for the metric at full precision.
    pub fn prerequisites(self) -> [Milestone; 2] {
        use Milestone::*;
        match self {
            Metric::AnnouncementLatency => [FirstAnnouncement, ProcessingStart],
            Metric::HeaderValidation => [ValidationHeader, ValidationContained],
            Metric::ContainedValidation => [ValidationContained, PreprocessStart],
            Metric::Preprocessing => [PreprocessStart, PreprocessEnd],
            Metric::BroadcastTime => [ProcessingStart, Broadcasted],
            Metric::ProcessingTime => [Broadcasted, ProcessingEnd],
            Metric::TotalLifecycleTime => [FirstAnnouncement, ProcessingEnd],
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::all_in_order()
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastBasis {
    ProcessingStart,
    /// Lower-fidelity estimate used when processing_start is missing.
    Announcement,
}

impl BroadcastBasis {
    pub fn name(self) -> &'static str {
        match self {
            BroadcastBasis::ProcessingStart => "processing_start",
            BroadcastBasis::Announcement => "announcement",
        }
    }
}

impl FromStr for BroadcastBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing_start" => Ok(BroadcastBasis::ProcessingStart),
            "announcement" => Ok(BroadcastBasis::Announcement),
            other => Err(format!("unknown broadcast basis '{}'", other)),
        }
    }
}

/// Interval metrics for one block. `None` means absent, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockMetrics {
    pub announcement_latency: Option<i64>,
    pub header_validation: Option<i64>,
    pub contained_validation: Option<i64>,
    pub preprocessing: Option<i64>,
    pub broadcast_time: Option<i64>,
    pub broadcast_basis: Option<BroadcastBasis>,
    pub processing_time: Option<i64>,
    pub total_lifecycle_time: Option<i64>,
}

impl BlockMetrics {
    pub fn get(&self, m: Metric) -> Option<i64> {
        match m {
            Metric::AnnouncementLatency => self.announcement_latency,
            Metric::HeaderValidation => self.header_validation,
            Metric::ContainedValidation => self.contained_validation,
            Metric::Preprocessing => self.preprocessing,
            Metric::BroadcastTime => self.broadcast_time,
            Metric::ProcessingTime => self.processing_time,
            Metric::TotalLifecycleTime => self.total_lifecycle_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BlockClassification {
    pub announced: bool,
    pub broadcast_observed: bool,
    pub fully_resolved: bool,
}

/// Everything the pipeline knows about one resolved block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub lifecycle: BlockLifecycle,
    pub metrics: BlockMetrics,
    pub classification: BlockClassification,
    pub ordering_violations: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub rows_read: usize,
    pub events: usize,
    pub malformed_rows: usize,
    pub unknown_kind_rows: usize,
}
