//! Reductions that look past a single form and scope: the worksheet status
//! hub of one scope, institution totals across countries and the
//! enrollment trend across academic years.

use crate::analysis::EnrollmentTrend;
use crate::error::{SessionError, StoreError};
use crate::models::{AcademicYear, Row, Scope, ACADEMIC_YEAR_ID, COUNTRY_ID};
use crate::session::FormSession;
use crate::store::{SurveyStore, ACADEMIC_YEARS};
use crate::survey::codec;
use crate::survey::key::Selector;
use crate::survey::schema::{FormKind, TableSchema};
use crate::survey::sheet::Sheet;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info};

const INSTITUTIONS: &str = "institutions";
const STUDENT_ENROLLMENT: &str = "student_enrollment";
const LEVEL: &str = "level";

/// Progress of one worksheet within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorksheetStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl WorksheetStatus {
    /// Status from how many of a form's tables hold data.
    pub fn from_counts(with_data: usize, tables: usize) -> Self {
        if with_data == 0 {
            WorksheetStatus::NotStarted
        } else if with_data < tables {
            WorksheetStatus::InProgress
        } else {
            WorksheetStatus::Completed
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            WorksheetStatus::NotStarted => "⬜",
            WorksheetStatus::InProgress => "🟡",
            WorksheetStatus::Completed => "✅",
        }
    }
}

impl fmt::Display for WorksheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorksheetStatus::NotStarted => write!(f, "Not started"),
            WorksheetStatus::InProgress => write!(f, "In progress"),
            WorksheetStatus::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormStatus {
    pub form: FormKind,
    pub title: String,
    pub tables: usize,
    pub tables_with_data: usize,
    pub status: WorksheetStatus,
}

/// Status of every form for `scope`. A table counts as started once it
/// holds a non-zero cell.
pub async fn worksheet_statuses<S>(
    store: &S,
    scope: Scope,
) -> Result<Vec<FormStatus>, SessionError>
where
    S: SurveyStore + Clone,
{
    let mut statuses = Vec::new();
    for kind in FormKind::all() {
        let mut session = FormSession::new(store.clone(), kind, scope);
        session.load().await?;

        let tables = session.sheets().len();
        let tables_with_data = session
            .sheets()
            .iter()
            .filter(|sheet| sheet.non_zero_len() > 0)
            .count();
        statuses.push(FormStatus {
            form: kind,
            title: session.form().title.to_string(),
            tables,
            tables_with_data,
            status: WorksheetStatus::from_counts(tables_with_data, tables),
        });
    }
    Ok(statuses)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelTotal {
    pub level: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryTotal {
    pub country_id: i64,
    pub total: u64,
}

/// Institutions of every reporting country for one academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionalSummary {
    pub academic_year_id: i64,
    pub levels: Vec<LevelTotal>,
    pub countries: Vec<CountryTotal>,
    pub total: u64,
}

/// Sum the institutions table across countries for `academic_year_id`.
pub async fn regional_summary<S: SurveyStore>(
    store: &S,
    academic_year_id: i64,
) -> Result<RegionalSummary, SessionError> {
    let schema = FormKind::Institutions.schema().table(INSTITUTIONS)?.clone();
    let levels = schema.values_of(LEVEL)?;
    let by_country = rows_by(
        select_all(store, INSTITUTIONS).await?,
        COUNTRY_ID,
        |row| int_column(row, ACADEMIC_YEAR_ID) == Some(academic_year_id),
    );

    let mut level_totals = vec![0u64; levels.len()];
    let mut countries = Vec::new();
    for (country_id, rows) in by_country {
        let sheet = decoded(&schema, &rows);
        for (sum, level) in level_totals.iter_mut().zip(&levels) {
            *sum += sheet.scope_total(&Selector::new().with(LEVEL, level))?;
        }
        countries.push(CountryTotal {
            country_id,
            total: sheet.grand_total(),
        });
    }

    info!(
        "Regional summary for academic year {}: {} countries",
        academic_year_id,
        countries.len()
    );
    Ok(RegionalSummary {
        academic_year_id,
        levels: levels
            .iter()
            .zip(&level_totals)
            .map(|(level, total)| LevelTotal {
                level: level.to_string(),
                total: *total,
            })
            .collect(),
        total: level_totals.iter().sum(),
        countries,
    })
}

/// Total enrollment of one country per academic year, oldest year first.
///
/// Years are ordered by `start_year` when the academic year is known and by
/// id otherwise.
pub async fn enrollment_totals_by_year<S: SurveyStore>(
    store: &S,
    country_id: i64,
) -> Result<Vec<(i64, u64)>, SessionError> {
    let schema = FormKind::Enrollment.schema().table(STUDENT_ENROLLMENT)?.clone();
    let by_year = rows_by(
        select_all(store, STUDENT_ENROLLMENT).await?,
        ACADEMIC_YEAR_ID,
        |row| int_column(row, COUNTRY_ID) == Some(country_id),
    );

    let start_years: HashMap<i64, i32> = academic_years(store)
        .await?
        .into_iter()
        .map(|year| (year.id, year.start_year))
        .collect();

    let mut totals: Vec<(i64, u64)> = by_year
        .into_iter()
        .map(|(year_id, rows)| (year_id, decoded(&schema, &rows).grand_total()))
        .collect();
    totals.sort_by_key(|(year_id, _)| (start_years.get(year_id).copied(), *year_id));
    Ok(totals)
}

/// Growth of the scope's year against the latest earlier year with data.
///
/// `None` when no earlier year has been entered.
pub async fn enrollment_trend<S: SurveyStore>(
    store: &S,
    scope: Scope,
) -> Result<Option<EnrollmentTrend>, SessionError> {
    let totals = enrollment_totals_by_year(store, scope.country_id).await?;
    let Some(position) = totals
        .iter()
        .position(|(year_id, _)| *year_id == scope.academic_year_id)
    else {
        debug!("No enrollment stored for {}, no trend", scope);
        return Ok(None);
    };
    if position == 0 {
        debug!("No enrollment before {}, no trend", scope);
        return Ok(None);
    }
    Ok(Some(EnrollmentTrend::new(totals[position - 1], totals[position])))
}

async fn select_all<S: SurveyStore>(store: &S, table: &str) -> Result<Vec<Row>, SessionError> {
    store
        .select_all(table)
        .await
        .map_err(|source| SessionError::Load {
            table: table.to_string(),
            source,
        })
}

async fn academic_years<S: SurveyStore>(store: &S) -> Result<Vec<AcademicYear>, SessionError> {
    select_all(store, ACADEMIC_YEARS)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)))
        .collect::<Result<Vec<AcademicYear>, _>>()
        .map_err(|e| SessionError::Load {
            table: ACADEMIC_YEARS.to_string(),
            source: StoreError::Json(e),
        })
}

fn int_column(row: &Row, column: &str) -> Option<i64> {
    row.get(column).and_then(Value::as_i64)
}

/// Group the rows passing `keep` by an integer column. Rows without it are
/// dropped.
fn rows_by(rows: Vec<Row>, column: &str, keep: impl Fn(&Row) -> bool) -> BTreeMap<i64, Vec<Row>> {
    let mut grouped: BTreeMap<i64, Vec<Row>> = BTreeMap::new();
    for row in rows.into_iter().filter(|row| keep(row)) {
        if let Some(id) = int_column(&row, column) {
            grouped.entry(id).or_default().push(row);
        }
    }
    grouped
}

fn decoded(schema: &TableSchema, rows: &[Row]) -> Sheet {
    let mut sheet = Sheet::new(schema.clone());
    let report = codec::decode(&mut sheet, rows);
    if report.skipped > 0 {
        debug!("{} rows of {} did not fit and were ignored", report.skipped, schema.name);
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TrendDirection;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    async fn save_cells(store: &Arc<MemoryStore>, kind: FormKind, scope: Scope, cells: &[(&str, &[&str], u64)]) {
        let mut session = FormSession::new(store.clone(), kind, scope);
        for &(table, values, count) in cells {
            session.set(table, values, count).unwrap();
        }
        session.save().await.unwrap();
    }

    #[test]
    fn test_status_from_counts() {
        assert_eq!(WorksheetStatus::from_counts(0, 2), WorksheetStatus::NotStarted);
        assert_eq!(WorksheetStatus::from_counts(1, 2), WorksheetStatus::InProgress);
        assert_eq!(WorksheetStatus::from_counts(2, 2), WorksheetStatus::Completed);
        assert_eq!(WorksheetStatus::InProgress.to_string(), "In progress");
    }

    #[tokio::test]
    async fn test_worksheet_statuses() {
        let store = Arc::new(MemoryStore::new());
        let scope = Scope::new(3, 10);
        save_cells(&store, FormKind::Population, scope, &[("population_data", &["6", "male"], 12)]).await;
        save_cells(
            &store,
            FormKind::Enrollment,
            Scope::new(4, 10),
            &[("student_enrollment", &["primary", "public", "6", "G1", "male"], 5)],
        )
        .await;

        let statuses = worksheet_statuses(&store, scope).await.unwrap();
        assert_eq!(statuses.len(), FormKind::all().len());

        let status_of = |kind: FormKind| statuses.iter().find(|s| s.form == kind).unwrap().status;
        assert_eq!(status_of(FormKind::Population), WorksheetStatus::Completed);
        assert_eq!(status_of(FormKind::Enrollment), WorksheetStatus::NotStarted);
        // An all-zero institutions row is written on save but holds no data.
        save_cells(&store, FormKind::Institutions, scope, &[]).await;
        let statuses = worksheet_statuses(&store, scope).await.unwrap();
        let institutions = statuses
            .iter()
            .find(|s| s.form == FormKind::Institutions)
            .unwrap();
        assert_eq!(institutions.status, WorksheetStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_partly_filled_form_is_in_progress() {
        let store = Arc::new(MemoryStore::new());
        let scope = Scope::new(3, 10);
        let form = FormKind::StaffDemographics.schema();
        let first = form.tables[0].cells().remove(0);
        let mut session = FormSession::new(store.clone(), FormKind::StaffDemographics, scope);
        session.set(form.tables[0].name, first.values(), 2).unwrap();
        session.save().await.unwrap();

        let statuses = worksheet_statuses(&store, scope).await.unwrap();
        let staff = statuses
            .iter()
            .find(|s| s.form == FormKind::StaffDemographics)
            .unwrap();
        assert_eq!(staff.tables, 2);
        assert_eq!(staff.tables_with_data, 1);
        assert_eq!(staff.status, WorksheetStatus::InProgress);
    }

    #[tokio::test]
    async fn test_regional_summary_sums_countries_of_one_year() {
        let store = Arc::new(MemoryStore::new());
        save_cells(
            &store,
            FormKind::Institutions,
            Scope::new(1, 10),
            &[
                ("institutions", &["primary", "public"], 12),
                ("institutions", &["primary", "private_church"], 3),
                ("institutions", &["post_secondary", "private"], 1),
            ],
        )
        .await;
        save_cells(
            &store,
            FormKind::Institutions,
            Scope::new(2, 10),
            &[("institutions", &["primary", "public"], 5)],
        )
        .await;
        save_cells(
            &store,
            FormKind::Institutions,
            Scope::new(2, 9),
            &[("institutions", &["daycare", "public"], 40)],
        )
        .await;

        let summary = regional_summary(&store, 10).await.unwrap();
        assert_eq!(summary.academic_year_id, 10);
        assert_eq!(
            summary.countries,
            vec![
                CountryTotal { country_id: 1, total: 16 },
                CountryTotal { country_id: 2, total: 5 },
            ]
        );
        let level = |name: &str| summary.levels.iter().find(|l| l.level == name).unwrap().total;
        assert_eq!(summary.levels.len(), 7);
        assert_eq!(level("primary"), 20);
        assert_eq!(level("post_secondary"), 1);
        assert_eq!(level("daycare"), 0);
        assert_eq!(summary.total, 21);
    }

    #[tokio::test]
    async fn test_regional_summary_of_empty_year() {
        let store = MemoryStore::new();
        let summary = regional_summary(&store, 10).await.unwrap();
        assert!(summary.countries.is_empty());
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn test_enrollment_trend_uses_previous_year() {
        let store = Arc::new(MemoryStore::new());
        // Year ids do not follow calendar order here; start_year decides.
        store
            .insert_many(
                ACADEMIC_YEARS,
                vec![
                    row(json!({"id": 7, "year_label": "2023-24", "start_year": 2023, "end_year": 2024, "is_active": true})),
                    row(json!({"id": 8, "year_label": "2022-23", "start_year": 2022, "end_year": 2023})),
                    row(json!({"id": 5, "year_label": "2021-22", "start_year": 2021, "end_year": 2022})),
                ],
            )
            .await
            .unwrap();
        let cell: &[&str] = &["primary", "public", "6", "G1", "female"];
        save_cells(&store, FormKind::Enrollment, Scope::new(3, 5), &[("student_enrollment", cell, 50)]).await;
        save_cells(&store, FormKind::Enrollment, Scope::new(3, 8), &[("student_enrollment", cell, 100)]).await;
        save_cells(&store, FormKind::Enrollment, Scope::new(3, 7), &[("student_enrollment", cell, 120)]).await;
        save_cells(&store, FormKind::Enrollment, Scope::new(4, 7), &[("student_enrollment", cell, 9)]).await;

        let totals = enrollment_totals_by_year(&store, 3).await.unwrap();
        assert_eq!(totals, vec![(5, 50), (8, 100), (7, 120)]);

        let trend = enrollment_trend(&store, Scope::new(3, 7)).await.unwrap().unwrap();
        assert_eq!(trend.previous_year_id, 8);
        assert_eq!(trend.current_total, 120);
        assert!((trend.growth_percent - 20.0).abs() < 1e-9);
        assert_eq!(trend.direction, TrendDirection::Increasing);

        let trend = enrollment_trend(&store, Scope::new(3, 8)).await.unwrap().unwrap();
        assert_eq!(trend.previous_year_id, 5);
        assert_eq!(trend.direction, TrendDirection::Increasing);
    }

    #[tokio::test]
    async fn test_no_trend_without_earlier_year() {
        let store = Arc::new(MemoryStore::new());
        let cell: &[&str] = &["secondary", "public", "14", "F3", "male"];
        save_cells(&store, FormKind::Enrollment, Scope::new(3, 2), &[("student_enrollment", cell, 10)]).await;

        assert!(enrollment_trend(&store, Scope::new(3, 2)).await.unwrap().is_none());
        assert!(enrollment_trend(&store, Scope::new(3, 3)).await.unwrap().is_none());
    }
}
