//! Compares a parsed visits CSV report with the expected visits

use crate::domain::types::DeviceId;
use crate::domain::visit::{AnimalSummary, ExpectedVisit};
use crate::error::{ensure_eq, CheckError, ReportError};
use crate::services::report::{VisitRow, VisitRowKind, VisitsReport};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub struct ReportChecker {
    report: VisitsReport,
    /// Next unconsumed visit row, kept across `check_visits` calls
    cursor: usize,
}

impl ReportChecker {
    pub fn new(body: &str) -> Result<Self, ReportError> {
        Ok(Self::from_report(VisitsReport::parse(body)?))
    }

    pub fn from_report(report: VisitsReport) -> Self {
        Self { report, cursor: 0 }
    }

    pub fn report(&self) -> &VisitsReport {
        &self.report
    }

    /// Check the aggregate and per-animal summary rows of a device
    pub fn check_summary(
        &self,
        device_id: DeviceId,
        expected: &[AnimalSummary],
    ) -> Result<(), CheckError> {
        let summary = self.report.device(device_id).ok_or(CheckError::MissingDevice(device_id))?;

        let animals: BTreeSet<&str> = summary.summary.animals().collect();
        let expected_animals: BTreeSet<&str> = expected.iter().map(|a| a.what.as_str()).collect();
        ensure_eq(format!("device {} animals", device_id), expected_animals, animals)?;
        ensure_eq(
            format!("device {} animal rows", device_id),
            expected.len(),
            summary.animals.len(),
        )?;

        for animal in expected {
            let row = summary.animals.get(&animal.what).ok_or_else(|| CheckError::MissingAnimal {
                device: device_id,
                animal: animal.what.clone(),
            })?;
            ensure_eq(
                format!("line {}: {} visits", row.line, animal.what),
                animal.visits,
                row.visit_count,
            )?;
            ensure_eq(
                format!("line {}: {} using audio bait", row.line, animal.what),
                animal.audio_bait,
                row.using_audio_bait,
            )?;
        }

        info!(device_id = %device_id, animals = expected.len(), "report_summary_checked");
        Ok(())
    }

    /// Check visit blocks. The report lists the newest visit first, so the
    /// last expected visit must come first.
    pub fn check_visits(&mut self, expected: &[ExpectedVisit]) -> Result<(), CheckError> {
        let rows = self.report.visit_rows();

        for (index, visit) in expected.iter().enumerate().rev() {
            let marker = next_row(rows, &mut self.cursor, || format!("Visit row for visit #{}", index))?;
            if marker.kind != VisitRowKind::Visit {
                return Err(CheckError::mismatch(
                    format!("line {}: row type", marker.line),
                    VisitRowKind::Visit.as_str(),
                    marker.kind.as_str(),
                ));
            }

            for event in visit.newest_first() {
                let row = next_row(rows, &mut self.cursor, || {
                    format!("{} event in visit #{}", event.what(), index)
                })?;
                for (field, value) in event.fields() {
                    ensure_eq(
                        format!("line {}: visit #{} {}", row.line, index, field),
                        value.as_str(),
                        row.field(field),
                    )?;
                }
            }

            debug!(visit = index, events = visit.len(), line = marker.line, "visit_checked");
        }

        info!(visits = expected.len(), "report_visits_checked");
        Ok(())
    }
}

fn next_row<'a>(
    rows: &'a [VisitRow],
    cursor: &mut usize,
    expected: impl FnOnce() -> String,
) -> Result<&'a VisitRow, CheckError> {
    let row = rows.get(*cursor).ok_or_else(|| CheckError::ReportExhausted { expected: expected() })?;
    *cursor += 1;
    Ok(row)
}
