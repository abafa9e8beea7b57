use serde::Serialize;

use crate::analytics::{self, PatientStatistics};
use crate::models::{
    ChartComplianceRecord, ComplianceEntry, ComplianceSummary, Pagination,
    PatientComplianceRecord,
};
use crate::query::Page;

#[derive(Debug, Clone, Serialize)]
pub struct ChartComplianceListing {
    pub records: Vec<ChartComplianceRecord>,
    pub statistics: ComplianceSummary,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientComplianceListing {
    pub data: Vec<PatientComplianceRecord>,
    pub pagination: Pagination,
    pub statistics: PatientStatistics,
}

/// `entries` is every entry in the filtered window, not just the page.
pub fn chart_listing(
    records: Vec<ChartComplianceRecord>,
    entries: &[ComplianceEntry],
    page: Page,
) -> ChartComplianceListing {
    let statistics = analytics::summarize(entries);

    ChartComplianceListing {
        records,
        pagination: Pagination {
            total: statistics.total_records,
            limit: page.limit,
            offset: page.offset,
            has_more: None,
        },
        statistics,
    }
}

pub fn patient_listing(
    data: Vec<PatientComplianceRecord>,
    entries: &[ComplianceEntry],
    page: Page,
) -> PatientComplianceListing {
    let summary = analytics::summarize(entries);

    PatientComplianceListing {
        data,
        pagination: Pagination {
            total: summary.total_records,
            limit: page.limit,
            offset: page.offset,
            has_more: Some(page.has_more(summary.total_records)),
        },
        statistics: PatientStatistics::from(&summary),
    }
}
