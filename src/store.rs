//! Write-through persistence for audit reports (spec.md §4.9, component H).
//!
//! Real database adapters are out of scope (spec.md §2 Non-goals); this
//! module defines the [`Store`] seam and one concrete, in-process
//! implementation (`InMemoryStore`) so the orchestrator and stream consumer
//! have something real to write through during tests and local runs.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::{
    aggregator::AuditReport,
    error::{AppResult, persistence_transient_error},
    fingerprint::SqlFingerprint
};

/// Millisecond timestamp, as received from the event envelope
/// (`crate::stream::AuditEvent::observed_at_ms`).
pub type Timestamp = i64;

/// Persistence seam for audit reports. All methods are async: a real
/// adapter talks to a database over the network.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn append(&self, fingerprint: SqlFingerprint, at: Timestamp, report: AuditReport) -> AppResult<()>;

    async fn append_batch(&self, reports: Vec<(SqlFingerprint, Timestamp, AuditReport)>) -> AppResult<()> {
        for (fingerprint, at, report) in reports {
            self.append(fingerprint, at, report).await?;
        }
        Ok(())
    }

    async fn find_by_id(&self, fingerprint: SqlFingerprint, at: Timestamp) -> AppResult<Option<AuditReport>>;

    async fn find_by_time_range(&self, from: Timestamp, to: Timestamp) -> AppResult<Vec<AuditReport>>;

    async fn count_by_time_range(&self, from: Timestamp, to: Timestamp) -> AppResult<u64>;

    async fn delete_older_than(&self, cutoff: Timestamp) -> AppResult<u64>;
}

/// `BTreeMap`-backed in-memory store, keyed by `(fingerprint, timestamp)`
/// for efficient ordered range scans.
#[derive(Default)]
pub struct InMemoryStore {
    reports: RwLock<BTreeMap<(SqlFingerprint, Timestamp), AuditReport>>
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn append(&self, fingerprint: SqlFingerprint, at: Timestamp, report: AuditReport) -> AppResult<()> {
        self.reports.write().await.insert((fingerprint, at), report);
        Ok(())
    }

    async fn find_by_id(&self, fingerprint: SqlFingerprint, at: Timestamp) -> AppResult<Option<AuditReport>> {
        Ok(self.reports.read().await.get(&(fingerprint, at)).cloned())
    }

    async fn find_by_time_range(&self, from: Timestamp, to: Timestamp) -> AppResult<Vec<AuditReport>> {
        let reports = self.reports.read().await;
        Ok(reports
            .iter()
            .filter(|((_, at), _)| *at >= from && *at <= to)
            .map(|(_, report)| report.clone())
            .collect())
    }

    async fn count_by_time_range(&self, from: Timestamp, to: Timestamp) -> AppResult<u64> {
        let reports = self.reports.read().await;
        Ok(reports
            .iter()
            .filter(|((_, at), _)| *at >= from && *at <= to)
            .count() as u64)
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> AppResult<u64> {
        let mut reports = self.reports.write().await;
        let stale: Vec<_> = reports
            .keys()
            .filter(|(_, at)| *at < cutoff)
            .copied()
            .collect();
        let removed = stale.len() as u64;
        for key in stale {
            reports.remove(&key);
        }
        Ok(removed)
    }
}

/// Wraps any [`Store`] to convert its errors into the retry ladder's
/// transient category, used when the concrete adapter doesn't distinguish
/// transient from permanent failures itself.
pub fn as_transient<T>(result: Result<T, String>) -> AppResult<T> {
    result.map_err(persistence_transient_error)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{checkers::{CheckerResult, RiskScore}, context::SqlContext, dialect::DialectId};

    fn sample_report() -> AuditReport {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        crate::aggregator::aggregate(&ctx, vec![CheckerResult::ok(
            "NoWhereClause",
            RiskScore::none(),
            Duration::from_millis(1)
        )])
    }

    #[tokio::test]
    async fn append_and_find_round_trips() {
        let store = InMemoryStore::new();
        let fp = SqlFingerprint(42);
        store.append(fp, 1000, sample_report()).await.unwrap();
        let found = store.find_by_id(fp, 1000).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn find_by_time_range_filters_correctly() {
        let store = InMemoryStore::new();
        let fp = SqlFingerprint(1);
        store.append(fp, 100, sample_report()).await.unwrap();
        store.append(fp, 200, sample_report()).await.unwrap();
        store.append(fp, 300, sample_report()).await.unwrap();
        let found = store.find_by_time_range(150, 250).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn delete_older_than_prunes_stale_rows() {
        let store = InMemoryStore::new();
        let fp = SqlFingerprint(1);
        store.append(fp, 100, sample_report()).await.unwrap();
        store.append(fp, 9_999, sample_report()).await.unwrap();
        let removed = store.delete_older_than(1_000).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_by_time_range(0, i64::MAX).await.unwrap(), 1);
    }
}
