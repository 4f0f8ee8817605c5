//! Data models shared across the application.
//!
//! Persisted rows are flat JSON records; the scope pair tags every one of
//! them and bounds each load/save cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A flat persisted record, as exchanged with the store.
pub type Row = serde_json::Map<String, Value>;

pub const COUNTRY_ID: &str = "country_id";
pub const ACADEMIC_YEAR_ID: &str = "academic_year_id";
pub const UPDATED_AT: &str = "updated_at";

/// The (country, academic year) pair bounding one load/save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub country_id: i64,
    pub academic_year_id: i64,
}

impl Scope {
    pub fn new(country_id: i64, academic_year_id: i64) -> Self {
        Self {
            country_id,
            academic_year_id,
        }
    }

    /// True when the row belongs to this scope.
    pub fn matches(&self, row: &Row) -> bool {
        row.get(COUNTRY_ID).and_then(Value::as_i64) == Some(self.country_id)
            && row.get(ACADEMIC_YEAR_ID).and_then(Value::as_i64) == Some(self.academic_year_id)
    }

    /// A new row carrying only the scope columns.
    pub fn row(&self) -> Row {
        let mut row = Row::new();
        row.insert(COUNTRY_ID.to_string(), Value::from(self.country_id));
        row.insert(ACADEMIC_YEAR_ID.to_string(), Value::from(self.academic_year_id));
        row
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "country {} / academic year {}",
            self.country_id, self.academic_year_id
        )
    }
}

/// An academic year as stored in the `academic_years` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: i64,
    pub year_label: String,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub is_active: bool,
}

/// Read the `updated_at` stamp of a persisted row.
pub fn row_updated_at(row: &Row) -> Option<DateTime<Utc>> {
    row.get(UPDATED_AT)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Balance between female and male counts, judged from the GPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityStatus {
    /// GPI below 0.95.
    MaleSkewed,
    /// GPI within 0.95..=1.05.
    Parity,
    /// GPI above 1.05.
    FemaleSkewed,
}

impl fmt::Display for ParityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParityStatus::MaleSkewed => write!(f, "Male-skewed"),
            ParityStatus::Parity => write!(f, "Parity"),
            ParityStatus::FemaleSkewed => write!(f, "Female-skewed"),
        }
    }
}

impl ParityStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            ParityStatus::Parity => "✅",
            ParityStatus::MaleSkewed | ParityStatus::FemaleSkewed => "⚠️",
        }
    }
}

/// Metadata about a rendered form.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub form: String,
    pub title: String,
    pub scope: Scope,
    pub generated_at: DateTime<Utc>,
    pub last_saved: Option<DateTime<Utc>>,
    pub source: String,
}

/// One line of a section: a row label, one count per column and the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRow {
    pub label: String,
    pub values: Vec<u64>,
    pub total: u64,
}

/// A grid of counts for one block of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: String,
    /// Label of the row dimension(s).
    pub row_header: String,
    pub columns: Vec<String>,
    pub rows: Vec<SectionRow>,
    pub column_totals: Vec<u64>,
    pub total: u64,
}

/// A table of a form, as rendered.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub name: String,
    pub title: String,
    pub grand_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<crate::analysis::GenderSplit>,
    pub sections: Vec<Section>,
}

/// The complete rendering of a loaded form.
#[derive(Debug, Clone, Serialize)]
pub struct FormReport {
    pub metadata: ReportMetadata,
    pub tables: Vec<TableReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<crate::analysis::EnrollmentIndicators>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_row_and_matches() {
        let scope = Scope::new(3, 10);
        let row = scope.row();
        assert_eq!(row.get("country_id"), Some(&json!(3)));
        assert!(scope.matches(&row));
        assert!(!Scope::new(3, 11).matches(&row));
        assert_eq!(scope.to_string(), "country 3 / academic year 10");
    }

    #[test]
    fn test_row_updated_at() {
        let mut row = Row::new();
        assert!(row_updated_at(&row).is_none());

        row.insert(UPDATED_AT.into(), json!("2024-09-01T08:30:00+00:00"));
        let stamp = row_updated_at(&row).unwrap();
        assert_eq!(stamp.to_rfc3339(), "2024-09-01T08:30:00+00:00");

        row.insert(UPDATED_AT.into(), json!("yesterday"));
        assert!(row_updated_at(&row).is_none());
    }

    #[test]
    fn test_academic_year_deserialize_defaults_inactive() {
        let year: AcademicYear = serde_json::from_value(json!({
            "id": 10,
            "year_label": "2022-23",
            "start_year": 2022,
            "end_year": 2023
        }))
        .unwrap();
        assert!(!year.is_active);
        assert_eq!(year.year_label, "2022-23");
    }

    #[test]
    fn test_parity_status_display() {
        assert_eq!(ParityStatus::Parity.to_string(), "Parity");
        assert_eq!(ParityStatus::Parity.emoji(), "✅");
        assert_eq!(ParityStatus::MaleSkewed.emoji(), "⚠️");
    }
}
