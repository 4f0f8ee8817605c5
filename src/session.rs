//! One form being edited for one (country, academic year) scope.
//!
//! The session owns the sheets, the dirty flag and the last-saved stamp.
//! Its only operations are load, set and save; reads and totals go through
//! the sheets.

use crate::error::{SchemaError, SessionError, StoreError};
use crate::models::{row_updated_at, Row, Scope};
use crate::store::SurveyStore;
use crate::survey::codec;
use crate::survey::input::{coerce_count, was_coerced};
use crate::survey::schema::{FormKind, FormSchema, Layout};
use crate::survey::sheet::Sheet;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

/// Counts reported by a successful load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: usize,
    pub cells: usize,
    pub skipped: usize,
}

/// Counts reported by a successful save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub tables: usize,
    pub rows: usize,
}

pub struct FormSession<S: SurveyStore> {
    store: S,
    form: FormSchema,
    scope: Scope,
    sheets: Vec<Sheet>,
    dirty: bool,
    last_saved: Option<DateTime<Utc>>,
}

impl<S: SurveyStore> FormSession<S> {
    /// An empty (all-zero) session. Call [`FormSession::load`] to fill it.
    pub fn new(store: S, kind: FormKind, scope: Scope) -> Self {
        let form = kind.schema();
        let sheets = form.tables.iter().cloned().map(Sheet::new).collect();
        Self {
            store,
            form,
            scope,
            sheets,
            dirty: false,
            last_saved: None,
        }
    }

    pub fn form(&self) -> &FormSchema {
        &self.form
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, table: &str) -> Result<&Sheet, SchemaError> {
        self.sheets
            .iter()
            .find(|s| s.name() == table)
            .ok_or_else(|| self.unknown_table(table))
    }

    fn sheet_mut(&mut self, table: &str) -> Result<&mut Sheet, SchemaError> {
        let missing = self.unknown_table(table);
        self.sheets
            .iter_mut()
            .find(|s| s.name() == table)
            .ok_or(missing)
    }

    fn unknown_table(&self, table: &str) -> SchemaError {
        SchemaError::UnknownTable {
            form: self.form.kind.to_string(),
            table: table.to_string(),
        }
    }

    /// True when cells changed since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    /// Replace the sheets with what the store holds for the scope.
    ///
    /// On failure the sheets are left empty and the error is returned, so the
    /// caller can show the all-zero form with a notice.
    pub async fn load(&mut self) -> Result<LoadSummary, SessionError> {
        let store = &self.store;
        let scope = self.scope;
        let selects = self.form.tables.iter().map(|table| async move {
            store
                .select_where(table.name, scope)
                .await
                .map_err(|source| SessionError::Load {
                    table: table.name.to_string(),
                    source,
                })
        });
        let results = try_join_all(selects).await;

        for sheet in &mut self.sheets {
            sheet.clear();
        }
        self.dirty = false;

        let tables = match results {
            Ok(tables) => tables,
            Err(e) => {
                self.last_saved = None;
                return Err(e);
            }
        };

        let mut summary = LoadSummary::default();
        for (sheet, rows) in self.sheets.iter_mut().zip(&tables) {
            let report = codec::decode(sheet, rows);
            summary.rows += rows.len();
            summary.cells += report.cells;
            summary.skipped += report.skipped;
        }
        self.last_saved = latest_stamp(&tables);

        info!(
            "Loaded {} for {}: {} rows, {} cells",
            self.form.kind, self.scope, summary.rows, summary.cells
        );
        Ok(summary)
    }

    /// Count stored for a cell, 0 when never set.
    pub fn get<V: AsRef<str>>(&self, table: &str, values: &[V]) -> Result<u64, SchemaError> {
        Ok(self.sheet(table)?.get_values(values))
    }

    /// Store a count for a cell and mark the session dirty.
    pub fn set<V: AsRef<str>>(
        &mut self,
        table: &str,
        values: &[V],
        value: u64,
    ) -> Result<(), SchemaError> {
        let sheet = self.sheet_mut(table)?;
        let key = sheet.schema().key(values)?;
        sheet.set(key, value)?;
        self.dirty = true;
        Ok(())
    }

    /// Store typed-in text for a cell, coercing it to a count first.
    pub fn set_input<V: AsRef<str>>(
        &mut self,
        table: &str,
        values: &[V],
        raw: &str,
    ) -> Result<u64, SchemaError> {
        let value = coerce_count(raw);
        if was_coerced(raw) {
            warn!("Input '{}' read as {}", raw, value);
        }
        self.set(table, values, value)?;
        Ok(value)
    }

    /// Persist every table of the form for the scope.
    ///
    /// Tables are written in declaration order and the first failure aborts
    /// the save. A failed save keeps the session dirty and leaves the
    /// last-saved stamp untouched.
    pub async fn save(&mut self) -> Result<SaveSummary, SessionError> {
        let mut summary = SaveSummary::default();

        for sheet in &self.sheets {
            let table = sheet.name();
            let rows = codec::encode(sheet, self.scope);
            let written = rows.len();
            let failed = |source: StoreError| SessionError::Save {
                table: table.to_string(),
                source,
            };

            match sheet.schema().layout {
                Layout::SingleRow { conflict_keys } => {
                    for row in rows {
                        self.store
                            .upsert_single(table, row, conflict_keys)
                            .await
                            .map_err(failed)?;
                    }
                }
                Layout::Long { .. } | Layout::GenderWide => {
                    self.store
                        .delete_where(table, self.scope)
                        .await
                        .map_err(failed)?;
                    if rows.is_empty() {
                        debug!("Nothing to insert into {}", table);
                    } else {
                        self.store.insert_many(table, rows).await.map_err(failed)?;
                    }
                }
            }

            debug!("Saved {} rows to {}", written, table);
            summary.tables += 1;
            summary.rows += written;
        }

        self.last_saved = Some(Utc::now());
        self.dirty = false;
        info!(
            "Saved {} for {} ({} rows) via {}",
            self.form.kind,
            self.scope,
            summary.rows,
            self.store.describe()
        );
        Ok(summary)
    }
}

/// Newest `updated_at` across every loaded row.
fn latest_stamp(tables: &[Vec<Row>]) -> Option<DateTime<Utc>> {
    tables.iter().flatten().filter_map(row_updated_at).max()
}
