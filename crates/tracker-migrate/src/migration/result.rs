//! Result envelopes returned by the migrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityKind;
use crate::error::Result;

/// Outcome of one entity procedure.
///
/// `success == false` exactly when `error` is set. `count` is the number of
/// records written, including the partial count of a failed procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<String>,
}

impl MigrationResult {
    pub fn completed(count: u64, logs: Vec<String>) -> Self {
        Self {
            success: true,
            count,
            error: None,
            logs,
        }
    }

    pub fn failed(count: u64, error: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            success: false,
            count,
            error: Some(error.into()),
            logs,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One entity's entry in a [`RunReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub entity: EntityKind,
    #[serde(flatten)]
    pub result: MigrationResult,
}

/// Result of a multi-entity run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    pub dry_run: bool,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Records written across all entities.
    pub total_count: u64,

    /// Per-entity results in execution order.
    pub entities: Vec<EntityOutcome>,

    /// Entities whose procedure failed.
    pub failed_entities: Vec<EntityKind>,
}

impl RunReport {
    pub fn new(
        run_id: String,
        dry_run: bool,
        started_at: DateTime<Utc>,
        entities: Vec<EntityOutcome>,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let total_count = entities.iter().map(|e| e.result.count).sum();
        let failed_entities = entities
            .iter()
            .filter(|e| !e.result.success)
            .map(|e| e.entity)
            .collect();

        Self {
            run_id,
            dry_run,
            started_at,
            completed_at,
            duration_seconds,
            total_count,
            entities,
            failed_entities,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_entities.is_empty()
    }

    pub fn result(&self, entity: EntityKind) -> Option<&MigrationResult> {
        self.entities
            .iter()
            .find(|e| e.entity == entity)
            .map(|e| &e.result)
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Source table and size for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity: EntityKind,
    /// Resolved source table; `None` when no candidate exists.
    pub table: Option<String>,
    pub rows: Option<i64>,
}

/// Connectivity of both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}
