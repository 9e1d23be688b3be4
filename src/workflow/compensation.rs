//! Tracking and rollback of provisional equipment records

use futures::future::join_all;
use tracing::{info, warn};

use super::types::ProvisionalRecord;
use crate::remote::ErpGateway;

/// Equipment records created during the current run that are not yet
/// confirmed by a successful receipt
#[derive(Debug, Default)]
pub struct ProvisionalTracker {
    records: Vec<ProvisionalRecord>,
}

impl ProvisionalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, record: ProvisionalRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The receipt succeeded; the records are permanent now
    pub fn confirm(&mut self) -> Vec<ProvisionalRecord> {
        std::mem::take(&mut self.records)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub deleted: Vec<ProvisionalRecord>,
    pub failed: Vec<(ProvisionalRecord, String)>,
}

impl CompensationReport {
    pub fn succeeded(&self) -> usize {
        self.deleted.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Delete every tracked record.
///
/// Deletions run concurrently and one failure does not stop the others.
/// The tracker is always empty afterwards; records that could not be deleted
/// are listed in the report for manual cleanup.
pub async fn compensate(gateway: &ErpGateway, tracker: &mut ProvisionalTracker) -> CompensationReport {
    let records = std::mem::take(&mut tracker.records);
    if records.is_empty() {
        return CompensationReport::default();
    }

    info!(count = records.len(), "Deleting provisional equipment records");

    let results = join_all(records.iter().map(|record| gateway.delete_equipment(record))).await;

    let mut report = CompensationReport::default();
    for (record, result) in records.into_iter().zip(results) {
        match result {
            Ok(()) => report.deleted.push(record),
            Err(err) => report.failed.push((record, err.remote_message())),
        }
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed_count(),
        "Compensation finished"
    );

    if report.is_partial_failure() {
        let orphaned = report
            .failed
            .iter()
            .map(|(record, _)| format!("{}/{}", record.item_number, record.serial))
            .collect::<Vec<_>>()
            .join(", ");
        warn!(
            failed = report.failed_count(),
            %orphaned,
            "CompensationPartialFailure: equipment records left behind need manual cleanup"
        );
    }

    report
}
