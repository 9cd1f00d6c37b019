//! Execution history for workflows

use super::WorkflowStatus;
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One status transition of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub workflow_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Records status transitions, optionally appending them to an NDJSON file
#[derive(Default)]
pub struct WorkflowMonitor {
    history: Mutex<HashMap<String, Vec<ExecutionEvent>>>,
    runs_path: Option<PathBuf>,
}

impl WorkflowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also persist every event to `path`
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            history: Mutex::default(),
            runs_path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn record(&self, workflow_id: &str, status: WorkflowStatus, metadata: Map<String, Value>) {
        let event = ExecutionEvent {
            workflow_id: workflow_id.to_string(),
            timestamp: Utc::now(),
            status,
            metadata,
        };
        log::debug!("{} -> {}", workflow_id, status);

        if let Some(path) = &self.runs_path
            && let Err(e) = append_event(path, &event)
        {
            log::warn!("Could not persist workflow event: {:#}", e);
        }

        if let Ok(mut history) = self.history.lock() {
            history
                .entry(workflow_id.to_string())
                .or_default()
                .push(event);
        }
    }

    pub fn last_status(&self, workflow_id: &str) -> Option<WorkflowStatus> {
        self.history
            .lock()
            .ok()?
            .get(workflow_id)?
            .last()
            .map(|e| e.status)
    }

    pub fn history(&self, workflow_id: &str) -> Vec<ExecutionEvent> {
        self.history
            .lock()
            .ok()
            .and_then(|h| h.get(workflow_id).cloned())
            .unwrap_or_default()
    }
}

fn append_event(path: &Path, event: &ExecutionEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}", serde_json::to_string(event)?)?;
    Ok(())
}

/// Read persisted events, newest first
///
/// A missing file is an empty history. Unparseable lines are skipped.
pub fn read_history(
    path: &Path,
    status: Option<WorkflowStatus>,
    limit: usize,
) -> Result<Vec<ExecutionEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut events = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ExecutionEvent>(&line) {
            Ok(event) if status.is_none_or(|s| s == event.status) => events.push(event),
            Ok(_) => {}
            Err(e) => log::debug!("Skipping bad history line: {}", e),
        }
    }
    events.reverse();
    events.truncate(limit);
    Ok(events)
}
