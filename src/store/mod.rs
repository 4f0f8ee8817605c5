//! Persistence backends for survey rows.
//!
//! Every backend speaks the same four operations, all bounded by a
//! (country, academic year) scope. No transactions are assumed: a save is a
//! delete followed by an insert, and a crash in between loses the scope.

pub mod file;
pub mod memory;
pub mod rest;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use rest::RestStore;

use crate::error::StoreError;
use crate::models::{AcademicYear, Row, Scope, UPDATED_AT};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Table holding the academic years.
pub const ACADEMIC_YEARS: &str = "academic_years";

/// The persistence collaborator.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Short description for log lines.
    fn describe(&self) -> String;

    /// All rows of `table` belonging to `scope`.
    async fn select_where(&self, table: &str, scope: Scope) -> Result<Vec<Row>, StoreError>;

    /// Every row of `table`, across all scopes.
    async fn select_all(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    /// Remove every row of `table` belonging to `scope`.
    async fn delete_where(&self, table: &str, scope: Scope) -> Result<(), StoreError>;

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError>;

    /// Insert `row`, or replace the existing row agreeing on `conflict_keys`.
    async fn upsert_single(
        &self,
        table: &str,
        row: Row,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError>;

    /// The academic year flagged active, if any.
    async fn active_academic_year(&self) -> Result<Option<AcademicYear>, StoreError>;
}

#[async_trait]
impl<T: SurveyStore + ?Sized> SurveyStore for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn select_where(&self, table: &str, scope: Scope) -> Result<Vec<Row>, StoreError> {
        (**self).select_where(table, scope).await
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        (**self).select_all(table).await
    }

    async fn delete_where(&self, table: &str, scope: Scope) -> Result<(), StoreError> {
        (**self).delete_where(table, scope).await
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        (**self).insert_many(table, rows).await
    }

    async fn upsert_single(
        &self,
        table: &str,
        row: Row,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError> {
        (**self).upsert_single(table, row, conflict_keys).await
    }

    async fn active_academic_year(&self) -> Result<Option<AcademicYear>, StoreError> {
        (**self).active_academic_year().await
    }
}

/// Pick the active year out of a list of `academic_years` rows.
pub(crate) fn find_active_year(rows: Vec<Row>) -> Result<Option<AcademicYear>, StoreError> {
    for row in rows {
        let year: AcademicYear = serde_json::from_value(Value::Object(row))?;
        if year.is_active {
            return Ok(Some(year));
        }
    }
    Ok(None)
}

/// Stamp `updated_at` the way the database default would.
pub(crate) fn stamp_updated_at(row: &mut Row) {
    row.insert(UPDATED_AT.to_string(), Value::from(Utc::now().to_rfc3339()));
}

/// True when `candidate` agrees with `row` on every conflict key.
pub(crate) fn same_conflict_keys(row: &Row, candidate: &Row, conflict_keys: &[&str]) -> bool {
    conflict_keys
        .iter()
        .all(|k| row.get(*k).is_some() && row.get(*k) == candidate.get(*k))
}
