use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::ComplianceEntry;
use crate::query;

/// One line of a compliance CSV export, as written in the file.
#[derive(Debug, Deserialize)]
struct RawCsvRow {
    patient_id: i32,
    diet_chart_id: Option<i32>,
    date: String,
    compliance_percentage: Option<i32>,
    meals_followed: i32,
    meals_total: i32,
    notes: Option<String>,
    source_key: Option<String>,
}

/// A CSV row that passed write-time validation.
#[derive(Debug, Clone)]
pub struct ComplianceCsvRow {
    pub patient_id: i32,
    pub diet_chart_id: Option<i32>,
    pub date: NaiveDate,
    pub compliance_percentage: Option<i32>,
    pub meals_followed: i32,
    pub meals_total: i32,
    pub notes: Option<String>,
    pub source_key: Option<String>,
}

impl ComplianceCsvRow {
    /// The write-time checks the analytics code relies on never having to make.
    fn parse(raw: RawCsvRow, today: NaiveDate) -> Result<Self, AppError> {
        let date = query::parse_date("date", &raw.date)?;
        if date > today {
            return Err(AppError::Validation(format!(
                "date {date} is in the future"
            )));
        }

        if let Some(pct) = raw.compliance_percentage {
            if !(0..=100).contains(&pct) {
                return Err(AppError::Validation(format!(
                    "compliance_percentage {pct} on {date} is outside 0-100"
                )));
            }
        }

        if raw.meals_followed < 0 {
            return Err(AppError::Validation(format!(
                "meals_followed {} on {date} is negative",
                raw.meals_followed
            )));
        }
        if raw.meals_followed > raw.meals_total {
            return Err(AppError::Validation(format!(
                "meals_followed {} exceeds meals_total {} on {date}",
                raw.meals_followed, raw.meals_total
            )));
        }

        Ok(Self {
            patient_id: raw.patient_id,
            diet_chart_id: raw.diet_chart_id,
            date,
            compliance_percentage: raw.compliance_percentage,
            meals_followed: raw.meals_followed,
            meals_total: raw.meals_total,
            notes: raw.notes,
            source_key: raw.source_key,
        })
    }

    pub fn entry(&self) -> ComplianceEntry {
        ComplianceEntry {
            date: self.date,
            compliance_percentage: self.compliance_percentage,
            meals_followed: self.meals_followed,
            meals_total: self.meals_total,
        }
    }
}

pub fn read_rows<R: Read>(reader: R) -> anyhow::Result<Vec<ComplianceCsvRow>> {
    read_rows_as_of(reader, Utc::now().date_naive())
}

/// Rows dated after `today` are rejected.
pub fn read_rows_as_of<R: Read>(
    reader: R,
    today: NaiveDate,
) -> anyhow::Result<Vec<ComplianceCsvRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<RawCsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let raw = result.with_context(|| format!("malformed CSV row at line {line}"))?;
        let row = ComplianceCsvRow::parse(raw, today)
            .with_context(|| format!("invalid CSV row at line {line}"))?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn read_path(path: &Path) -> anyhow::Result<Vec<ComplianceCsvRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_rows(file)
}
