//! Wire schema for the `sql-audit-events` topic (spec.md §6).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{context::ExecutionMetadata, store::Timestamp};

pub type PartitionId = i32;
pub type OffsetId = i64;

/// One observed SQL execution, as produced by the ORM/connection-pool
/// extraction shim (out of scope here — spec.md §1 reduces it to this
/// contract).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditEvent {
    pub sql:                     String,
    #[serde(rename = "sqlType")]
    pub sql_type:                String,
    #[serde(rename = "mapperId")]
    pub mapper_id:                String,
    pub datasource:                String,
    #[serde(rename = "executionTimeMs")]
    pub execution_time_ms:        i64,
    #[serde(rename = "rowsAffected")]
    pub rows_affected:            i32,
    #[serde(rename = "errorMessage")]
    pub error_message:            Option<String>,
    pub timestamp:                DateTime<Utc>
}

impl AuditEvent {
    /// Milliseconds since the epoch, the key granularity `Store` uses.
    pub fn timestamp_millis(&self) -> Timestamp {
        self.timestamp.timestamp_millis()
    }

    /// Build the execution-side facts the `SlowQuery`/`ErrorRate` checkers
    /// read. `sql_type` on the wire is informational only — the checkers see
    /// the `CommandType` [`crate::fingerprint::normalize`] derives from the
    /// SQL text itself, not this producer-supplied label.
    pub fn execution_metadata(&self) -> ExecutionMetadata {
        ExecutionMetadata {
            mapper_id:     Some(self.mapper_id.clone()),
            latency:       Some(Duration::from_millis(self.execution_time_ms.max(0) as u64)),
            succeeded:     Some(self.error_message.is_none()),
            rows_examined: None,
            rows_returned: Some(self.rows_affected.max(0) as u64)
        }
    }
}

/// Dead-letter envelope: the original event plus why it failed and on which
/// attempt (spec.md §6).
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterEvent {
    pub payload:         String,
    #[serde(rename = "failureReason")]
    pub failure_reason:  String,
    pub attempt:         u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_the_documented_schema() {
        let json = r#"{
            "sql": "SELECT * FROM orders WHERE id = ?",
            "sqlType": "SELECT",
            "mapperId": "OrderMapper.findById",
            "datasource": "primary",
            "executionTimeMs": 42,
            "rowsAffected": 1,
            "errorMessage": null,
            "timestamp": "2026-01-01T00:00:00Z"
        }"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.mapper_id, "OrderMapper.findById");
        assert_eq!(event.execution_metadata().succeeded, Some(true));
    }
}
