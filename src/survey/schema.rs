//! Closed vocabularies of the survey forms.
//!
//! A form is a set of tables; a table is an ordered list of dimensions and
//! one or more blocks. A block lists the allowed values per dimension and
//! the table's vocabulary is the union of the blocks' cartesian products.
//! Blocks let each education level carry its own categories (grades for
//! primary, forms for secondary, programmes for post-secondary).

use crate::error::SchemaError;
use crate::survey::key::{CellKey, Selector, KEY_DELIMITER};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Name of the gender dimension. Tables that have it keep it last.
pub const GENDER: &str = "gender";
pub const GENDERS: &[&str] = &["male", "female"];

const PUBLIC_PRIVATE: &[&str] = &["public", "private"];
const NATIONAL: &[&str] = &["national"];
const NO_CATEGORY: &[&str] = &["none"];

const EARLY_CHILDHOOD: &[&str] = &["early_childhood"];
const SPECIAL_EDUCATION: &[&str] = &["special_education"];
const PRIMARY: &[&str] = &["primary"];
const SECONDARY: &[&str] = &["secondary"];
const POST_SECONDARY: &[&str] = &["post_secondary"];
const PRE_PRIMARY: &[&str] = &["pre_primary"];
const SCHOOL_LEVELS: &[&str] = &["primary", "secondary", "post_secondary"];

const POPULATION_AGES: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
    "17", "18", "19", "20", "21", "22", "23", "24", "25",
];

const EARLY_CHILDHOOD_AGES: &[&str] = &["under_1", "1", "2", "3", "4", "over_4", "unknown"];
const SPECIAL_EDUCATION_AGES: &[&str] = &[
    "5_8", "9_11", "12_14", "15_17", "18_20", "over_20", "unknown",
];
const PRIMARY_AGES: &[&str] = &[
    "under_5", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "over_15", "unknown",
];
const PRIMARY_GRADES: &[&str] = &["K", "G1", "G2", "G3", "G4", "G5", "G6"];
const SECONDARY_AGES: &[&str] = &[
    "under_11", "11", "12", "13", "14", "15", "16", "17", "18", "over_18", "unknown",
];
const SECONDARY_FORMS: &[&str] = &["F1", "F2", "F3", "F4", "F5"];
const POST_SECONDARY_AGES: &[&str] = &[
    "under_16", "16", "17", "18", "19", "20", "21", "22", "23", "24", "25", "over_25", "unknown",
];
const POST_SECONDARY_PROGRAMMES: &[&str] = &["TVET", "CAPE", "Hospitality", "Other", "Tertiary"];

const STAFF_LEVELS: &[&str] = &["pre_primary", "primary", "secondary", "post_secondary"];
const STAFF_ROLES_DEMOGRAPHICS: &[&str] = &["teacher"];
const STAFF_AGE_RANGES: &[&str] = &[
    "under_19", "20_29", "30_39", "40_49", "50_59", "60_plus", "unknown",
];
const STAFF_SERVICE_RANGES: &[&str] = &[
    "under_1", "1_5", "6_10", "11_15", "16_20", "21_25", "26_30", "31_35", "over_35", "unknown",
];
const PRE_PRIMARY_ROLES: &[&str] = &["principal", "teacher", "care_giver"];
const SCHOOL_ROLES: &[&str] = &["principal", "deputy_principal", "teacher"];
const QUALIFICATIONS: &[&str] = &[
    "graduate_trained",
    "graduate_untrained",
    "non_graduate_trained",
    "non_graduate_untrained",
];

const INSTITUTION_LEVELS: &[&str] = &[
    "daycare",
    "preschool",
    "primary",
    "secondary",
    "special_ed",
    "tvet",
];
const INSTITUTION_OWNERSHIP: &[&str] = &["public", "private_church", "private_non_affiliated"];

/// How a dimension value is written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Text,
    Integer,
}

/// One categorical column of a survey table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub name: &'static str,
    pub kind: DimensionKind,
    /// In-memory stand-in for a persisted NULL (`national`, `none`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_sentinel: Option<&'static str>,
}

impl Dimension {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: DimensionKind::Text,
            null_sentinel: None,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: DimensionKind::Integer,
            null_sentinel: None,
        }
    }

    pub const fn nullable(name: &'static str, sentinel: &'static str) -> Self {
        Self {
            name,
            kind: DimensionKind::Text,
            null_sentinel: Some(sentinel),
        }
    }
}

/// Allowed values per dimension for one region of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    axes: Vec<&'static [&'static str]>,
}

impl Block {
    pub fn new(axes: Vec<&'static [&'static str]>) -> Self {
        Self { axes }
    }

    pub fn axes(&self) -> &[&'static [&'static str]] {
        &self.axes
    }

    pub fn cell_count(&self) -> usize {
        self.axes.iter().map(|a| a.len()).product()
    }

    /// Every cell of the block, last dimension varying fastest.
    pub fn cells(&self) -> Vec<CellKey> {
        self.cells_matching(&vec![None; self.axes.len()])
    }

    fn admits(&self, key: &CellKey) -> bool {
        key.len() == self.axes.len()
            && self
                .axes
                .iter()
                .zip(key.values())
                .all(|(axis, value)| axis.iter().any(|a| *a == value.as_str()))
    }

    /// Enumerate the block's cells that agree with `pattern`.
    fn cells_matching(&self, pattern: &[Option<&str>]) -> Vec<CellKey> {
        let mut candidates: Vec<Vec<&str>> = Vec::with_capacity(self.axes.len());
        for (axis, fixed) in self.axes.iter().zip(pattern) {
            match fixed {
                Some(v) if axis.iter().any(|a| a == v) => candidates.push(vec![*v]),
                Some(_) => return Vec::new(),
                None => candidates.push(axis.to_vec()),
            }
        }

        let mut cells = Vec::new();
        if candidates.iter().any(|c| c.is_empty()) {
            return cells;
        }

        let mut cursor = vec![0usize; candidates.len()];
        loop {
            cells.push(CellKey::new(
                cursor.iter().zip(&candidates).map(|(&i, c)| c[i]),
            ));

            // Odometer step, last dimension fastest.
            let mut axis = candidates.len();
            loop {
                if axis == 0 {
                    return cells;
                }
                axis -= 1;
                cursor[axis] += 1;
                if cursor[axis] < candidates[axis].len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
    }
}

/// How a table's cells map onto persisted rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per non-zero cell, count in `value_column`.
    Long { value_column: &'static str },
    /// One row per non-gender tuple with a `male` and a `female` column.
    GenderWide,
    /// One row per scope, one `{dim1}_{dim2}` column per cell, upserted.
    SingleRow {
        conflict_keys: &'static [&'static str],
    },
}

/// A survey table: dimensions, vocabulary and persisted layout.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub dimensions: Vec<Dimension>,
    pub blocks: Vec<Block>,
    pub layout: Layout,
}

impl TableSchema {
    pub fn arity(&self) -> usize {
        self.dimensions.len()
    }

    pub fn has_gender(&self) -> bool {
        self.dimensions.last().map(|d| d.name) == Some(GENDER)
    }

    pub fn dimension_index(&self, name: &str) -> Result<usize, SchemaError> {
        self.dimensions
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| SchemaError::UnknownDimension {
                table: self.name.to_string(),
                dimension: name.to_string(),
            })
    }

    /// Build a key for `values`, rejecting tuples outside the vocabulary.
    pub fn key<S: AsRef<str>>(&self, values: &[S]) -> Result<CellKey, SchemaError> {
        if values.len() != self.arity() {
            return Err(SchemaError::Arity {
                table: self.name.to_string(),
                expected: self.arity(),
                actual: values.len(),
            });
        }
        let key = CellKey::new(values.iter().map(|v| v.as_ref().to_string()));
        if !self.admits(&key) {
            return Err(SchemaError::OutsideVocabulary {
                table: self.name.to_string(),
                key: key.joined(),
            });
        }
        Ok(key)
    }

    pub fn admits(&self, key: &CellKey) -> bool {
        self.blocks.iter().any(|b| b.admits(key))
    }

    /// Resolve a selector into one optional fixed value per dimension.
    pub fn pattern<'a>(&self, selector: &'a Selector) -> Result<Vec<Option<&'a str>>, SchemaError> {
        let mut pattern = vec![None; self.arity()];
        for (dimension, value) in selector.fixed() {
            let index = self.dimension_index(dimension)?;
            pattern[index] = Some(value.as_str());
        }
        Ok(pattern)
    }

    /// Every vocabulary cell agreeing with `selector`, in block order.
    pub fn cells_matching(&self, selector: &Selector) -> Result<Vec<CellKey>, SchemaError> {
        let pattern = self.pattern(selector)?;
        Ok(self
            .blocks
            .iter()
            .flat_map(|b| b.cells_matching(&pattern))
            .collect())
    }

    pub fn cells(&self) -> Vec<CellKey> {
        let pattern = vec![None; self.arity()];
        self.blocks
            .iter()
            .flat_map(|b| b.cells_matching(&pattern))
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.blocks.iter().map(Block::cell_count).sum()
    }

    /// Distinct values of one dimension across all blocks, first-seen order.
    pub fn values_of(&self, dimension: &str) -> Result<Vec<&'static str>, SchemaError> {
        let index = self.dimension_index(dimension)?;
        let mut seen = Vec::new();
        for block in &self.blocks {
            for value in block.axes[index].iter() {
                if !seen.contains(value) {
                    seen.push(*value);
                }
            }
        }
        Ok(seen)
    }

    /// Column name of a cell in a single-row layout.
    pub fn wide_column(key: &CellKey) -> String {
        key.values().join("_")
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::Invalid {
            table: self.name.to_string(),
            reason,
        };

        if self.blocks.is_empty() {
            return Err(invalid("no blocks".to_string()));
        }

        for block in &self.blocks {
            if block.axes.len() != self.arity() {
                return Err(invalid(format!(
                    "block has {} axes for {} dimensions",
                    block.axes.len(),
                    self.arity()
                )));
            }
            for value in block.axes.iter().flat_map(|a| a.iter()) {
                if value.is_empty() || value.contains(KEY_DELIMITER) {
                    return Err(invalid(format!("illegal vocabulary value '{}'", value)));
                }
            }
        }

        let mut seen = HashSet::new();
        for key in self.cells() {
            if !seen.insert(key.clone()) {
                return Err(invalid(format!("cell {} appears in two blocks", key)));
            }
        }

        match self.layout {
            Layout::GenderWide if !self.has_gender() => {
                Err(invalid("gender-wide layout needs gender last".to_string()))
            }
            Layout::SingleRow { .. } => {
                let columns: HashSet<String> = self.cells().iter().map(Self::wide_column).collect();
                if columns.len() != self.cell_count() {
                    return Err(invalid("single-row column names collide".to_string()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// The survey forms known to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FormKind {
    /// Population by single year of age and sex
    Population,
    /// Number of institutions by level and ownership
    Institutions,
    /// Student enrollment by level, ownership, age and grade
    Enrollment,
    /// Teacher age and years-of-service distributions
    StaffDemographics,
    /// Staff qualifications and professional development
    StaffQualifications,
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormKind::Population => "population",
            FormKind::Institutions => "institutions",
            FormKind::Enrollment => "enrollment",
            FormKind::StaffDemographics => "staff-demographics",
            FormKind::StaffQualifications => "staff-qualifications",
        };
        write!(f, "{}", name)
    }
}

impl FormKind {
    pub fn all() -> [FormKind; 5] {
        [
            FormKind::Population,
            FormKind::Institutions,
            FormKind::Enrollment,
            FormKind::StaffDemographics,
            FormKind::StaffQualifications,
        ]
    }

    pub fn schema(self) -> FormSchema {
        match self {
            FormKind::Population => FormSchema {
                kind: self,
                title: "Population by Age and Sex",
                tables: vec![population_table()],
            },
            FormKind::Institutions => FormSchema {
                kind: self,
                title: "Educational Institutions",
                tables: vec![institutions_table()],
            },
            FormKind::Enrollment => FormSchema {
                kind: self,
                title: "Student Enrollment",
                tables: vec![enrollment_table()],
            },
            FormKind::StaffDemographics => FormSchema {
                kind: self,
                title: "Staff Demographics",
                tables: vec![
                    staff_distribution_table("staff_age_distribution", "age_range", STAFF_AGE_RANGES),
                    staff_distribution_table(
                        "staff_years_of_service",
                        "service_range",
                        STAFF_SERVICE_RANGES,
                    ),
                ],
            },
            FormKind::StaffQualifications => FormSchema {
                kind: self,
                title: "Staff Qualifications",
                tables: vec![staff_qualifications_table(), professional_development_table()],
            },
        }
    }
}

/// One survey form: the unit of a load/save cycle.
#[derive(Debug, Clone)]
pub struct FormSchema {
    pub kind: FormKind,
    pub title: &'static str,
    pub tables: Vec<TableSchema>,
}

impl FormSchema {
    pub fn table(&self, name: &str) -> Result<&TableSchema, SchemaError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SchemaError::UnknownTable {
                form: self.kind.to_string(),
                table: name.to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        self.tables.iter().try_for_each(TableSchema::validate)
    }
}

fn population_table() -> TableSchema {
    TableSchema {
        name: "population_data",
        dimensions: vec![Dimension::integer("age"), Dimension::text(GENDER)],
        blocks: vec![Block::new(vec![POPULATION_AGES, GENDERS])],
        layout: Layout::GenderWide,
    }
}

fn institutions_table() -> TableSchema {
    TableSchema {
        name: "institutions",
        dimensions: vec![Dimension::text("level"), Dimension::text("ownership")],
        blocks: vec![
            Block::new(vec![INSTITUTION_LEVELS, INSTITUTION_OWNERSHIP]),
            Block::new(vec![POST_SECONDARY, PUBLIC_PRIVATE]),
        ],
        layout: Layout::SingleRow {
            conflict_keys: &["country_id", "academic_year_id"],
        },
    }
}

fn enrollment_table() -> TableSchema {
    TableSchema {
        name: "student_enrollment",
        dimensions: vec![
            Dimension::text("education_level"),
            Dimension::nullable("ownership_type", "national"),
            Dimension::text("age_group"),
            Dimension::nullable("category", "none"),
            Dimension::text(GENDER),
        ],
        blocks: vec![
            Block::new(vec![
                EARLY_CHILDHOOD,
                PUBLIC_PRIVATE,
                EARLY_CHILDHOOD_AGES,
                NO_CATEGORY,
                GENDERS,
            ]),
            Block::new(vec![
                SPECIAL_EDUCATION,
                PUBLIC_PRIVATE,
                SPECIAL_EDUCATION_AGES,
                NO_CATEGORY,
                GENDERS,
            ]),
            Block::new(vec![
                PRIMARY,
                PUBLIC_PRIVATE,
                PRIMARY_AGES,
                PRIMARY_GRADES,
                GENDERS,
            ]),
            Block::new(vec![
                SECONDARY,
                PUBLIC_PRIVATE,
                SECONDARY_AGES,
                SECONDARY_FORMS,
                GENDERS,
            ]),
            Block::new(vec![
                POST_SECONDARY,
                NATIONAL,
                POST_SECONDARY_AGES,
                POST_SECONDARY_PROGRAMMES,
                GENDERS,
            ]),
        ],
        layout: Layout::Long {
            value_column: "count",
        },
    }
}

fn staff_distribution_table(
    name: &'static str,
    range_dimension: &'static str,
    ranges: &'static [&'static str],
) -> TableSchema {
    TableSchema {
        name,
        dimensions: vec![
            Dimension::text("role"),
            Dimension::text("education_level"),
            Dimension::text("ownership_type"),
            Dimension::text(range_dimension),
            Dimension::text(GENDER),
        ],
        blocks: vec![Block::new(vec![
            STAFF_ROLES_DEMOGRAPHICS,
            STAFF_LEVELS,
            PUBLIC_PRIVATE,
            ranges,
            GENDERS,
        ])],
        layout: Layout::Long {
            value_column: "count",
        },
    }
}

fn staff_qualifications_table() -> TableSchema {
    TableSchema {
        name: "staff_qualifications",
        dimensions: vec![
            Dimension::text("education_level"),
            Dimension::text("ownership_type"),
            Dimension::text("role"),
            Dimension::text("qualification_category"),
            Dimension::text(GENDER),
        ],
        blocks: vec![
            Block::new(vec![
                PRE_PRIMARY,
                PUBLIC_PRIVATE,
                PRE_PRIMARY_ROLES,
                QUALIFICATIONS,
                GENDERS,
            ]),
            Block::new(vec![
                SCHOOL_LEVELS,
                PUBLIC_PRIVATE,
                SCHOOL_ROLES,
                QUALIFICATIONS,
                GENDERS,
            ]),
        ],
        layout: Layout::Long {
            value_column: "count",
        },
    }
}

fn professional_development_table() -> TableSchema {
    TableSchema {
        name: "professional_development",
        dimensions: vec![Dimension::text("education_level"), Dimension::text("role")],
        blocks: vec![
            Block::new(vec![PRE_PRIMARY, PRE_PRIMARY_ROLES]),
            Block::new(vec![SCHOOL_LEVELS, SCHOOL_ROLES]),
        ],
        layout: Layout::Long {
            value_column: "participants_count",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_forms_validate() {
        for kind in FormKind::all() {
            let form = kind.schema();
            assert!(form.validate().is_ok(), "{} failed validation", kind);
            assert!(!form.tables.is_empty());
        }
    }

    #[test]
    fn test_enrollment_vocabulary_is_per_level() {
        let table = FormKind::Enrollment.schema().tables.remove(0);

        assert!(table.key(&["primary", "public", "5", "G1", "male"]).is_ok());
        assert!(table.key(&["secondary", "private", "12", "F3", "female"]).is_ok());
        assert!(table
            .key(&["post_secondary", "national", "over_25", "CAPE", "male"])
            .is_ok());

        // Grades belong to primary only; post-secondary has no public/private split.
        assert!(matches!(
            table.key(&["secondary", "public", "12", "G1", "male"]),
            Err(SchemaError::OutsideVocabulary { .. })
        ));
        assert!(table
            .key(&["post_secondary", "public", "18", "TVET", "male"])
            .is_err());
        assert!(matches!(
            table.key(&["primary", "public", "5", "G1"]),
            Err(SchemaError::Arity { expected: 5, actual: 4, .. })
        ));
    }

    #[test]
    fn test_cells_matching_enumerates_vocabulary() {
        let table = FormKind::Enrollment.schema().tables.remove(0);
        let row = Selector::new()
            .with("education_level", "primary")
            .with("ownership_type", "public")
            .with("age_group", "6")
            .with("gender", "male");

        let cells = table.cells_matching(&row).unwrap();
        assert_eq!(cells.len(), PRIMARY_GRADES.len());
        assert_eq!(cells[0].values()[3], "K");

        let bogus = Selector::new().with("education_level", "kindergarten");
        assert!(table.cells_matching(&bogus).unwrap().is_empty());

        let unknown = Selector::new().with("grade", "G1");
        assert!(matches!(
            table.cells_matching(&unknown),
            Err(SchemaError::UnknownDimension { .. })
        ));
    }

    #[test]
    fn test_values_of_and_cell_count() {
        let form = FormKind::StaffQualifications.schema();
        let quals = form.table("staff_qualifications").unwrap();
        assert_eq!(
            quals.values_of("role").unwrap(),
            vec!["principal", "teacher", "care_giver", "deputy_principal"]
        );
        // pre_primary: 2 * 3 * 4 * 2, others: 3 * 2 * 3 * 4 * 2
        assert_eq!(quals.cell_count(), 48 + 144);

        let population = FormKind::Population.schema();
        assert_eq!(population.tables[0].cell_count(), 52);
        let block_cells = population.tables[0].blocks[0].cells();
        assert_eq!(block_cells.len(), 52);
        assert_eq!(block_cells[1].joined(), "0|female");
        assert!(population.tables[0].has_gender());
        assert!(!FormKind::Institutions.schema().tables[0].has_gender());
    }

    #[test]
    fn test_validate_rejects_delimiter_and_overlap() {
        const PIPED: &[&str] = &["x|y"];
        const XY: &[&str] = &["x", "y"];
        const Y: &[&str] = &["y"];

        let bad_value = TableSchema {
            name: "bad",
            dimensions: vec![Dimension::text("a"), Dimension::text(GENDER)],
            blocks: vec![Block::new(vec![PIPED, GENDERS])],
            layout: Layout::Long {
                value_column: "count",
            },
        };
        assert!(bad_value.validate().is_err());

        let overlapping = TableSchema {
            name: "overlap",
            dimensions: vec![Dimension::text("a"), Dimension::text(GENDER)],
            blocks: vec![
                Block::new(vec![XY, GENDERS]),
                Block::new(vec![Y, GENDERS]),
            ],
            layout: Layout::Long {
                value_column: "count",
            },
        };
        assert!(overlapping.validate().is_err());
    }

    #[test]
    fn test_unknown_table() {
        let form = FormKind::Population.schema();
        assert!(matches!(
            form.table("student_enrollment"),
            Err(SchemaError::UnknownTable { .. })
        ));
    }
}
