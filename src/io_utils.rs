use anyhow::{anyhow, Context, Result};
use log::info;
use std::ffi::OsStr;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::ingest::read_events;
use crate::model::{IngestStats, RawEvent};

/// Profiler CSV files under `log_path`, sorted. A plain file is returned as is.
pub fn scan_logs(log_path: &Path) -> Result<Vec<PathBuf>> {
    if log_path.is_file() {
        return Ok(vec![log_path.to_path_buf()]);
    }

    let mut logs = Vec::new();
    for entry in WalkDir::new(log_path).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() == Some(OsStr::new("csv")) {
            logs.push(entry.path().to_path_buf());
        }
    }

    if logs.is_empty() {
        return Err(anyhow!(
            "No profiler logs found under: {} (expected .csv files)",
            log_path.display()
        ));
    }
    logs.sort();
    Ok(logs)
}

/// Reads every log into one event stream, in path order.
pub fn load_events(paths: &[PathBuf]) -> Result<(Vec<RawEvent>, IngestStats)> {
    let mut events = Vec::new();
    let mut stats = IngestStats::default();

    for path in paths {
        let file = fs::File::open(path).map_err(|source| IngestError::Io {
            path: path.clone(),
            source,
        })?;
        let before = events.len();
        read_events(BufReader::new(file), &mut events, &mut stats)
            .with_context(|| format!("parse profiler log {}", path.display()))?;
        info!("loaded {} events from {}", events.len() - before, path.display());
    }
    Ok((events, stats))
}
