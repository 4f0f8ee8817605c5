//! In-memory store, used for dry runs and tests.

use super::{find_active_year, same_conflict_keys, stamp_updated_at, SurveyStore, ACADEMIC_YEARS};
use crate::error::StoreError;
use crate::models::{AcademicYear, Row, Scope};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Rows kept per table in a map; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row currently held for `table`, across all scopes.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Seed the `academic_years` table.
    pub fn with_academic_years(years: &[AcademicYear]) -> Result<Self, StoreError> {
        let rows = years
            .iter()
            .map(|y| match serde_json::to_value(y)? {
                serde_json::Value::Object(map) => Ok(map),
                other => Err(StoreError::Config(format!("academic year is not an object: {}", other))),
            })
            .collect::<Result<Vec<Row>, StoreError>>()?;

        let mut tables = HashMap::new();
        tables.insert(ACADEMIC_YEARS.to_string(), rows);
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn select_where(&self, table: &str, scope: Scope) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| scope.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self.rows(table).await)
    }

    async fn delete_where(&self, table: &str, scope: Scope) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            let before = rows.len();
            rows.retain(|r| !scope.matches(r));
            debug!("Deleted {} rows from {}", before - rows.len(), table);
        }
        Ok(())
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        for mut row in rows {
            stamp_updated_at(&mut row);
            stored.push(row);
        }
        Ok(())
    }

    async fn upsert_single(
        &self,
        table: &str,
        mut row: Row,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError> {
        stamp_updated_at(&mut row);
        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        match stored
            .iter_mut()
            .find(|existing| same_conflict_keys(&row, existing, conflict_keys))
        {
            Some(existing) => existing.extend(row),
            None => stored.push(row),
        }
        Ok(())
    }

    async fn active_academic_year(&self) -> Result<Option<AcademicYear>, StoreError> {
        find_active_year(self.rows(ACADEMIC_YEARS).await)
    }
}
