//! Sparse count storage for one survey table.
//!
//! Cells never entered are absent and read as zero. Totals are recomputed
//! on every call by enumerating the table vocabulary, so absent cells count
//! correctly and nothing is cached.

use crate::error::SchemaError;
use crate::survey::input::MAX_COUNT;
use crate::survey::key::{CellKey, Selector};
use crate::survey::schema::TableSchema;
use std::collections::BTreeMap;

/// Sparse mapping from cell keys to counts.
#[derive(Debug, Clone)]
pub struct Sheet {
    schema: TableSchema,
    cells: BTreeMap<CellKey, u64>,
}

impl Sheet {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            cells: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    /// Stored count for the exact key, 0 when absent.
    pub fn get(&self, key: &CellKey) -> u64 {
        self.cells.get(key).copied().unwrap_or(0)
    }

    /// Convenience lookup by raw values; tuples outside the vocabulary read 0.
    pub fn get_values<S: AsRef<str>>(&self, values: &[S]) -> u64 {
        self.schema
            .key(values)
            .map(|key| self.get(&key))
            .unwrap_or(0)
    }

    /// Store or overwrite a count. Counts above [`MAX_COUNT`] are rejected.
    pub fn set(&mut self, key: CellKey, value: u64) -> Result<(), SchemaError> {
        if value > MAX_COUNT {
            return Err(SchemaError::CountTooLarge {
                table: self.schema.name.to_string(),
                value,
                max: MAX_COUNT,
            });
        }
        if !self.schema.admits(&key) {
            return Err(SchemaError::OutsideVocabulary {
                table: self.schema.name.to_string(),
                key: key.joined(),
            });
        }
        self.cells.insert(key, value);
        Ok(())
    }

    /// Sum over exactly one free dimension, e.g. both genders of a grade row
    /// or every grade of one age/gender row in a matrix.
    pub fn row_total(&self, fixed: &Selector) -> Result<u64, SchemaError> {
        let free = self.schema.arity() - self.schema.pattern(fixed)?.iter().flatten().count();
        if free != 1 {
            return Err(SchemaError::NotARow {
                table: self.schema.name.to_string(),
                free,
            });
        }
        self.scope_total(fixed)
    }

    /// Sum over every free dimension of the selector.
    pub fn scope_total(&self, fixed: &Selector) -> Result<u64, SchemaError> {
        Ok(self
            .schema
            .cells_matching(fixed)?
            .iter()
            .map(|key| self.get(key))
            .sum())
    }

    /// Sum with a single dimension fixed, e.g. every female cell.
    pub fn column_total(&self, dimension: &str, value: &str) -> Result<u64, SchemaError> {
        self.scope_total(&Selector::new().with(dimension, value))
    }

    pub fn grand_total(&self) -> u64 {
        self.cells.values().sum()
    }

    /// Stored cells in key order, zeros included.
    pub fn entries(&self) -> impl Iterator<Item = (&CellKey, u64)> {
        self.cells.iter().map(|(k, v)| (k, *v))
    }

    /// Number of cells holding a non-zero count.
    pub fn non_zero_len(&self) -> usize {
        self.cells.values().filter(|v| **v > 0).count()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::input::coerce_count;
    use crate::survey::schema::FormKind;

    fn enrollment() -> Sheet {
        Sheet::new(FormKind::Enrollment.schema().tables.remove(0))
    }

    fn key(sheet: &Sheet, values: &[&str]) -> CellKey {
        sheet.schema().key(values).unwrap()
    }

    #[test]
    fn test_absent_reads_zero() {
        let sheet = enrollment();
        for cell in sheet.schema().cells().iter().take(50) {
            assert_eq!(sheet.get(cell), 0);
        }
        assert_eq!(sheet.get_values(&["primary", "public", "5", "G1", "male"]), 0);
        assert_eq!(sheet.get_values(&["not", "a", "cell"]), 0);
    }

    #[test]
    fn test_read_after_write() {
        let mut sheet = enrollment();
        let k = key(&sheet, &["secondary", "public", "14", "F3", "female"]);
        sheet.set(k.clone(), 17).unwrap();
        assert_eq!(sheet.get(&k), 17);

        sheet.set(k.clone(), 4).unwrap();
        assert_eq!(sheet.get(&k), 4);
    }

    #[test]
    fn test_set_outside_vocabulary_is_rejected() {
        let mut sheet = enrollment();
        let err = sheet
            .set(CellKey::new(["primary", "public", "5", "F1", "male"]), 3)
            .unwrap_err();
        assert!(matches!(err, SchemaError::OutsideVocabulary { .. }));
        assert_eq!(sheet.grand_total(), 0);
    }

    #[test]
    fn test_counts_above_cap_are_rejected() {
        let mut sheet = Sheet::new(FormKind::Population.schema().tables.remove(0));
        let male = key(&sheet, &["6", "male"]);
        let female = key(&sheet, &["6", "female"]);

        assert!(matches!(
            sheet.set(male.clone(), u64::MAX),
            Err(SchemaError::CountTooLarge { .. })
        ));
        assert_eq!(sheet.get(&male), 0);

        sheet.set(male, coerce_count("18446744073709551615")).unwrap();
        sheet.set(female, 1).unwrap();
        let age_six = Selector::new().with("age", "6");
        assert_eq!(sheet.row_total(&age_six).unwrap(), MAX_COUNT + 1);
    }

    #[test]
    fn test_totals_at_cap_do_not_overflow() {
        let mut sheet = enrollment();
        for cell in sheet.schema().cells() {
            sheet.set(cell, MAX_COUNT).unwrap();
        }
        let cells = sheet.schema().cell_count() as u64;
        assert_eq!(sheet.grand_total(), cells * MAX_COUNT);
        assert_eq!(
            sheet.scope_total(&Selector::new()).unwrap(),
            sheet.grand_total()
        );
        assert_eq!(
            sheet.column_total("gender", "male").unwrap(),
            cells / 2 * MAX_COUNT
        );
    }

    #[test]
    fn test_row_totals_include_unset_cells_as_zero() {
        let mut sheet = enrollment();
        sheet
            .set(key(&sheet, &["primary", "public", "6", "G1", "male"]), 10)
            .unwrap();
        sheet
            .set(key(&sheet, &["primary", "public", "6", "G1", "female"]), 5)
            .unwrap();

        let grade_row = |grade: &str| {
            Selector::new()
                .with("education_level", "primary")
                .with("ownership_type", "public")
                .with("age_group", "6")
                .with("category", grade)
        };

        assert_eq!(sheet.row_total(&grade_row("G1")).unwrap(), 15);
        for grade in ["K", "G2", "G3", "G4", "G5", "G6"] {
            assert_eq!(sheet.row_total(&grade_row(grade)).unwrap(), 0);
        }

        // Matrix row: one age and gender, summed across the seven grades.
        let male_row = Selector::new()
            .with("education_level", "primary")
            .with("ownership_type", "public")
            .with("age_group", "6")
            .with("gender", "male");
        assert_eq!(sheet.row_total(&male_row).unwrap(), 10);
    }

    #[test]
    fn test_row_total_requires_one_free_dimension() {
        let sheet = enrollment();
        let two_free = Selector::new()
            .with("education_level", "primary")
            .with("ownership_type", "public")
            .with("age_group", "6");
        assert!(matches!(
            sheet.row_total(&two_free),
            Err(SchemaError::NotARow { free: 2, .. })
        ));
    }

    #[test]
    fn test_scope_and_column_totals() {
        let mut sheet = enrollment();
        let cells = [
            (["primary", "public", "5", "K", "male"], 12),
            (["primary", "public", "7", "G2", "female"], 8),
            (["primary", "private", "7", "G2", "female"], 3),
            (["secondary", "public", "12", "F1", "male"], 20),
            (["post_secondary", "national", "19", "CAPE", "female"], 6),
        ];
        for (values, count) in cells {
            let k = key(&sheet, &values);
            sheet.set(k, count).unwrap();
        }

        let primary_public = Selector::new()
            .with("education_level", "primary")
            .with("ownership_type", "public");
        assert_eq!(sheet.scope_total(&primary_public).unwrap(), 20);

        let primary = Selector::new().with("education_level", "primary");
        assert_eq!(sheet.scope_total(&primary).unwrap(), 23);

        assert_eq!(sheet.column_total("gender", "female").unwrap(), 17);
        assert_eq!(sheet.column_total("gender", "male").unwrap(), 32);
        assert_eq!(sheet.grand_total(), 49);
        assert_eq!(sheet.scope_total(&Selector::new()).unwrap(), sheet.grand_total());
    }

    #[test]
    fn test_totals_match_sum_of_gets() {
        let mut sheet = enrollment();
        let all = sheet.schema().cells();
        for (i, cell) in all.iter().enumerate().filter(|(i, _)| i % 37 == 0) {
            sheet.set(cell.clone(), (i % 11) as u64).unwrap();
        }

        let selector = Selector::new().with("education_level", "secondary");
        let expected: u64 = sheet
            .schema()
            .cells_matching(&selector)
            .unwrap()
            .iter()
            .map(|k| sheet.get(k))
            .sum();
        assert_eq!(sheet.scope_total(&selector).unwrap(), expected);
    }

    #[test]
    fn test_entries_keep_zeros_and_clear() {
        let mut sheet = enrollment();
        let k = key(&sheet, &["early_childhood", "public", "3", "none", "male"]);
        sheet.set(k.clone(), 5).unwrap();
        sheet.set(k, 0).unwrap();
        assert_eq!(sheet.entries().count(), 1);
        assert_eq!(sheet.non_zero_len(), 0);

        sheet.clear();
        assert_eq!(sheet.entries().count(), 0);
    }
}
