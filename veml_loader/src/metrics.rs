use std::fmt;

use serde::Serialize;
use url::Url;
use uuid::Uuid;
use veml_runtime::{MigrationWarning, SchemaVersion};
use veml_schema::CapabilityHints;

/// Stages of one document load, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoadState {
    Idle,
    Downloading,
    Parsed,
    Migrated,
    Validated,
    ProcessingMetadata,
    ProcessingEnvironment,
    WaitingForEntities,
    ApplyingHierarchy,
    Done,
    Failed,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Downloading => "downloading",
            LoadState::Parsed => "parsed",
            LoadState::Migrated => "migrated",
            LoadState::Validated => "validated",
            LoadState::ProcessingMetadata => "processing_metadata",
            LoadState::ProcessingEnvironment => "processing_environment",
            LoadState::WaitingForEntities => "waiting_for_entities",
            LoadState::ApplyingHierarchy => "applying_hierarchy",
            LoadState::Done => "done",
            LoadState::Failed => "failed",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadMetrics {
    pub entities_requested: usize,
    pub entities_completed: usize,
    pub hierarchy_applied: usize,
    pub hierarchy_skipped: usize,
    pub scripts_run: usize,
    pub scripts_skipped: usize,
    pub on_load_events_run: usize,
    pub input_events_registered: usize,
    pub sync_services_registered: usize,
    pub sync_services_skipped: usize,
    pub resource_failures: usize,
    pub served_from_store: bool,
}

/// Outcome of a load that reached `Done`.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub uri: Url,
    pub source_version: SchemaVersion,
    pub title: String,
    pub capabilities: CapabilityHints,
    pub states: Vec<LoadState>,
    pub warnings: Vec<MigrationWarning>,
    /// Entity ids in the order creation requests were issued.
    pub entity_ids: Vec<Uuid>,
    pub entities_timed_out: bool,
    pub metrics: LoadMetrics,
}

impl LoadReport {
    pub fn final_state(&self) -> LoadState {
        self.states.last().copied().unwrap_or(LoadState::Idle)
    }
}
