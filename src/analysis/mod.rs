//! Indicators derived from loaded sheets.

pub mod indicators;

pub use indicators::*;
