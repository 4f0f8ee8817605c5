//! JSON-file store: one `<table>.json` array per table under a directory.

use super::{find_active_year, same_conflict_keys, stamp_updated_at, SurveyStore, ACADEMIC_YEARS};
use crate::error::StoreError;
use crate::models::{AcademicYear, Row, Scope};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

/// Offline backend. Whole files are rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn table_path(&self, table: &str) -> Result<PathBuf, StoreError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::Config(format!("illegal table name '{}'", table)));
        }
        Ok(self.dir.join(format!("{}.json", table)))
    }

    async fn read_table(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let path = self.table_path(table)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_table(&self, table: &str, rows: &[Row]) -> Result<(), StoreError> {
        let path = self.table_path(table)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(rows)?;
        tokio::fs::write(&path, content).await?;
        debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl SurveyStore for FileStore {
    fn describe(&self) -> String {
        format!("file store at {}", self.dir.display())
    }

    async fn select_where(&self, table: &str, scope: Scope) -> Result<Vec<Row>, StoreError> {
        let _guard = self.lock.lock().await;
        let rows = self.read_table(table).await?;
        Ok(rows.into_iter().filter(|r| scope.matches(r)).collect())
    }

    async fn select_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_table(table).await
    }

    async fn delete_where(&self, table: &str, scope: Scope) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.read_table(table).await?;
        let before = rows.len();
        rows.retain(|r| !scope.matches(r));
        if rows.len() != before {
            self.write_table(table, &rows).await?;
        }
        Ok(())
    }

    async fn insert_many(&self, table: &str, new_rows: Vec<Row>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.read_table(table).await?;
        for mut row in new_rows {
            stamp_updated_at(&mut row);
            rows.push(row);
        }
        self.write_table(table, &rows).await
    }

    async fn upsert_single(
        &self,
        table: &str,
        mut row: Row,
        conflict_keys: &[&str],
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut rows = self.read_table(table).await?;
        stamp_updated_at(&mut row);
        match rows
            .iter_mut()
            .find(|existing| same_conflict_keys(&row, existing, conflict_keys))
        {
            Some(existing) => existing.extend(row),
            None => rows.push(row),
        }
        self.write_table(table, &rows).await
    }

    async fn active_academic_year(&self) -> Result<Option<AcademicYear>, StoreError> {
        let _guard = self.lock.lock().await;
        find_active_year(self.read_table(ACADEMIC_YEARS).await?)
    }
}
