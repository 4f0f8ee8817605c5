//! Composite keys for survey cells.
//!
//! A cell is addressed by a structured tuple of dimension values. The
//! `|`-joined form exists for display and diagnostics; it is never
//! persisted and never parsed back into a lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter used by [`build_key`]. Schema validation rejects vocabulary
/// values containing it.
pub const KEY_DELIMITER: char = '|';

/// Join dimension values into a single display key.
pub fn build_key<S: AsRef<str>>(dimensions: &[S]) -> String {
    let mut key = String::new();
    for (i, value) in dimensions.iter().enumerate() {
        if i > 0 {
            key.push(KEY_DELIMITER);
        }
        key.push_str(value.as_ref());
    }
    key
}

/// Structured key of one survey cell, ordered per the table's dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey(Vec<String>);

impl CellKey {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The key without its last dimension (the row a gender pair belongs to).
    pub fn prefix(&self) -> &[String] {
        &self.0[..self.0.len().saturating_sub(1)]
    }

    pub fn joined(&self) -> String {
        build_key(&self.0)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

/// A partial assignment of dimension values. Dimensions not named are free
/// and get summed over when the selector is used for a total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    fixed: Vec<(String, String)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix `dimension` to `value`. Fixing the same dimension twice keeps the
    /// last value.
    pub fn with(mut self, dimension: &str, value: &str) -> Self {
        self.fixed.retain(|(d, _)| d != dimension);
        self.fixed.push((dimension.to_string(), value.to_string()));
        self
    }

    pub fn fixed(&self) -> &[(String, String)] {
        &self.fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_build_key_joins_in_order() {
        assert_eq!(
            build_key(&["primary", "public", "5", "G1", "male"]),
            "primary|public|5|G1|male"
        );
        assert_eq!(build_key::<&str>(&[]), "");
    }

    #[test]
    fn test_cell_key_hash_and_display() {
        let a = CellKey::new(["secondary", "private", "12", "F1", "female"]);
        let b = CellKey::new(vec!["secondary".to_string(), "private".into(), "12".into(), "F1".into(), "female".into()]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
        assert_eq!(a.to_string(), "secondary|private|12|F1|female");
        assert_eq!(a.prefix().len(), 4);
        assert_eq!(a.values()[4], "female");
    }

    #[test]
    fn test_selector_overwrites_same_dimension() {
        let selector = Selector::new()
            .with("gender", "male")
            .with("gender", "female");
        assert_eq!(selector.fixed().len(), 1);
        assert_eq!(
            selector.fixed(),
            &[("gender".to_string(), "female".to_string())]
        );
    }
}
