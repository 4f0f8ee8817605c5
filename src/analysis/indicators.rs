//! Gender parity and enrollment indicators.
//!
//! Every ratio in the application goes through [`gender_parity_index`], so a
//! zero male total never produces NaN or infinity.

use crate::error::SchemaError;
use crate::models::ParityStatus;
use crate::survey::key::Selector;
use crate::survey::schema::GENDER;
use crate::survey::sheet::Sheet;
use serde::Serialize;

/// GPI at or above which females are over-represented.
pub const PARITY_UPPER: f64 = 1.05;
/// GPI below which males are over-represented.
pub const PARITY_LOWER: f64 = 0.95;
/// Share of over-aged students (percent) flagged as high.
pub const OVER_AGED_ALERT_PERCENT: f64 = 20.0;
/// Year-over-year growth (percent) beyond which enrollment is trending.
pub const TREND_THRESHOLD_PERCENT: f64 = 5.0;

/// Female count divided by male count.
///
/// With no males the index is 2.0 when there are females and 1.0 when the
/// whole population is empty.
pub fn gender_parity_index(male: u64, female: u64) -> f64 {
    if male == 0 {
        return if female > 0 { 2.0 } else { 1.0 };
    }
    female as f64 / male as f64
}

pub fn parity_status(gpi: f64) -> ParityStatus {
    if gpi < PARITY_LOWER {
        ParityStatus::MaleSkewed
    } else if gpi > PARITY_UPPER {
        ParityStatus::FemaleSkewed
    } else {
        ParityStatus::Parity
    }
}

/// Male and female totals for a selection of a gendered sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenderSplit {
    pub male: u64,
    pub female: u64,
    pub total: u64,
    pub gpi: f64,
    pub status: ParityStatus,
}

impl GenderSplit {
    pub fn new(male: u64, female: u64) -> Self {
        let gpi = gender_parity_index(male, female);
        Self {
            male,
            female,
            total: male + female,
            gpi,
            status: parity_status(gpi),
        }
    }
}

/// Gender split over the cells matching `selector`.
pub fn gender_split(sheet: &Sheet, selector: &Selector) -> Result<GenderSplit, SchemaError> {
    let male = sheet.scope_total(&selector.clone().with(GENDER, "male"))?;
    let female = sheet.scope_total(&selector.clone().with(GENDER, "female"))?;
    Ok(GenderSplit::new(male, female))
}

/// Enrollment totals for one education level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelBreakdown {
    pub level: String,
    #[serde(flatten)]
    pub split: GenderSplit,
    pub public: u64,
    pub private: u64,
    /// Percent of the level's students in an `over_*` age group.
    pub over_aged_percent: f64,
}

/// Dashboard indicators for a student enrollment sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentIndicators {
    pub levels: Vec<LevelBreakdown>,
    pub overall: GenderSplit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<EnrollmentTrend>,
    pub insights: Vec<String>,
}

impl EnrollmentIndicators {
    /// Attach the year-over-year trend and its insight.
    pub fn with_trend(&mut self, trend: EnrollmentTrend) {
        self.insights.push(trend.insight());
        self.trend = Some(trend);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Enrollment growth between the two most recent academic years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentTrend {
    pub previous_year_id: i64,
    pub previous_total: u64,
    pub current_year_id: i64,
    pub current_total: u64,
    pub growth_percent: f64,
    pub direction: TrendDirection,
}

impl EnrollmentTrend {
    pub fn new(previous: (i64, u64), current: (i64, u64)) -> Self {
        let growth_percent = growth_percent(previous.1, current.1);
        Self {
            previous_year_id: previous.0,
            previous_total: previous.1,
            current_year_id: current.0,
            current_total: current.1,
            growth_percent,
            direction: trend_direction(growth_percent),
        }
    }

    pub fn insight(&self) -> String {
        match self.direction {
            TrendDirection::Increasing => format!(
                "📈 Positive enrollment trend: student enrollment is increasing ({:+.1}% year over year)",
                self.growth_percent
            ),
            TrendDirection::Decreasing => format!(
                "📉 Declining enrollment trend: student enrollment is decreasing ({:+.1}% year over year)",
                self.growth_percent
            ),
            TrendDirection::Stable => format!(
                "➡️ Stable enrollment: student numbers are relatively consistent ({:+.1}% year over year)",
                self.growth_percent
            ),
        }
    }
}

/// Percent change from `previous` to `current`. An empty previous year is
/// treated as 1 so the result stays finite.
pub fn growth_percent(previous: u64, current: u64) -> f64 {
    (current as f64 - previous as f64) / previous.max(1) as f64 * 100.0
}

pub fn trend_direction(growth_percent: f64) -> TrendDirection {
    if growth_percent > TREND_THRESHOLD_PERCENT {
        TrendDirection::Increasing
    } else if growth_percent < -TREND_THRESHOLD_PERCENT {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

const LEVEL: &str = "education_level";
const OWNERSHIP: &str = "ownership_type";
const AGE_GROUP: &str = "age_group";

/// Compute the per-level breakdown and parity insights of `sheet`.
pub fn enrollment_indicators(sheet: &Sheet) -> Result<EnrollmentIndicators, SchemaError> {
    let schema = sheet.schema();
    let ages = schema.values_of(AGE_GROUP)?;
    let mut levels = Vec::new();

    for level in schema.values_of(LEVEL)? {
        let at_level = Selector::new().with(LEVEL, level);
        let split = gender_split(sheet, &at_level)?;

        let over_aged: u64 = ages
            .iter()
            .filter(|age| age.starts_with("over_"))
            .map(|age| sheet.scope_total(&at_level.clone().with(AGE_GROUP, age)))
            .sum::<Result<u64, SchemaError>>()?;
        let over_aged_percent = if split.total == 0 {
            0.0
        } else {
            over_aged as f64 * 100.0 / split.total as f64
        };

        levels.push(LevelBreakdown {
            level: level.to_string(),
            split,
            public: sheet.scope_total(&at_level.clone().with(OWNERSHIP, "public"))?,
            private: sheet.scope_total(&at_level.clone().with(OWNERSHIP, "private"))?,
            over_aged_percent,
        });
    }

    let overall = gender_split(sheet, &Selector::new())?;
    let insights = enrollment_insights(&overall, &levels);
    Ok(EnrollmentIndicators {
        levels,
        overall,
        trend: None,
        insights,
    })
}

fn enrollment_insights(overall: &GenderSplit, levels: &[LevelBreakdown]) -> Vec<String> {
    let mut insights = Vec::new();
    if overall.total == 0 {
        insights.push("No enrollment has been entered for this scope yet".to_string());
        return insights;
    }

    let emoji = overall.status.emoji();
    insights.push(match overall.status {
        ParityStatus::MaleSkewed => format!(
            "{} Gender disparity: male enrollment is well above female enrollment (GPI {:.2})",
            emoji, overall.gpi
        ),
        ParityStatus::FemaleSkewed => format!(
            "{} Gender disparity: female enrollment is well above male enrollment (GPI {:.2})",
            emoji, overall.gpi
        ),
        ParityStatus::Parity => format!(
            "{} Gender parity: enrollment is balanced between male and female students (GPI {:.2})",
            emoji, overall.gpi
        ),
    });

    for level in levels.iter().filter(|l| l.split.total > 0) {
        if level.over_aged_percent > OVER_AGED_ALERT_PERCENT {
            insights.push(format!(
                "⚠️ High over-aged enrollment in {}: {:.1}% of students are older than expected",
                level.level, level.over_aged_percent
            ));
        }
    }
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::schema::FormKind;

    fn enrollment() -> Sheet {
        Sheet::new(FormKind::Enrollment.schema().tables.remove(0))
    }

    fn set(sheet: &mut Sheet, values: &[&str], count: u64) {
        let key = sheet.schema().key(values).unwrap();
        sheet.set(key, count).unwrap();
    }

    #[test]
    fn test_gpi_zero_guard() {
        assert_eq!(gender_parity_index(0, 0), 1.0);
        assert_eq!(gender_parity_index(0, 7), 2.0);
        assert_eq!(gender_parity_index(10, 0), 0.0);
        assert!((gender_parity_index(100, 97) - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_parity_bands() {
        assert_eq!(parity_status(0.94), ParityStatus::MaleSkewed);
        assert_eq!(parity_status(0.95), ParityStatus::Parity);
        assert_eq!(parity_status(1.05), ParityStatus::Parity);
        assert_eq!(parity_status(1.06), ParityStatus::FemaleSkewed);
        assert_eq!(parity_status(gender_parity_index(0, 0)), ParityStatus::Parity);
    }

    #[test]
    fn test_empty_sheet_indicators() {
        let indicators = enrollment_indicators(&enrollment()).unwrap();
        assert_eq!(indicators.overall.gpi, 1.0);
        assert_eq!(indicators.levels.len(), 5);
        assert!(indicators.levels.iter().all(|l| l.over_aged_percent == 0.0));
        assert_eq!(indicators.insights.len(), 1);
        assert!(indicators.insights[0].contains("No enrollment"));
    }

    #[test]
    fn test_level_breakdown() {
        let mut sheet = enrollment();
        set(&mut sheet, &["primary", "public", "6", "G1", "male"], 40);
        set(&mut sheet, &["primary", "private", "6", "G1", "female"], 30);
        set(&mut sheet, &["primary", "public", "over_15", "G6", "female"], 10);
        set(&mut sheet, &["post_secondary", "national", "19", "CAPE", "female"], 5);

        let indicators = enrollment_indicators(&sheet).unwrap();
        let primary = indicators
            .levels
            .iter()
            .find(|l| l.level == "primary")
            .unwrap();
        assert_eq!(primary.split.male, 40);
        assert_eq!(primary.split.female, 40);
        assert_eq!(primary.split.status, ParityStatus::Parity);
        assert_eq!(primary.public, 50);
        assert_eq!(primary.private, 30);
        assert!((primary.over_aged_percent - 12.5).abs() < 1e-9);

        let post = indicators
            .levels
            .iter()
            .find(|l| l.level == "post_secondary")
            .unwrap();
        assert_eq!(post.split.gpi, 2.0);
        assert_eq!(post.public, 0);

        assert_eq!(indicators.overall.total, 85);
        assert_eq!(indicators.overall.status, ParityStatus::FemaleSkewed);
        assert!(indicators.insights[0].starts_with("⚠️ Gender disparity: female"));
    }

    #[test]
    fn test_over_aged_insight() {
        let mut sheet = enrollment();
        set(&mut sheet, &["secondary", "public", "over_18", "F5", "male"], 30);
        set(&mut sheet, &["secondary", "public", "over_18", "F5", "female"], 30);
        set(&mut sheet, &["secondary", "public", "14", "F3", "male"], 20);
        set(&mut sheet, &["secondary", "public", "14", "F3", "female"], 20);

        let indicators = enrollment_indicators(&sheet).unwrap();
        assert!(indicators.insights[0].starts_with("✅"));
        assert!(indicators
            .insights
            .iter()
            .any(|i| i.contains("over-aged enrollment in secondary: 60.0%")));
    }

    #[test]
    fn test_growth_guards_empty_previous_year() {
        assert!((growth_percent(200, 230) - 15.0).abs() < 1e-9);
        assert!((growth_percent(200, 180) + 10.0).abs() < 1e-9);
        assert_eq!(growth_percent(0, 0), 0.0);
        assert_eq!(growth_percent(0, 40), 4000.0);
        assert!(growth_percent(0, 40).is_finite());
    }

    #[test]
    fn test_trend_bands() {
        assert_eq!(trend_direction(5.1), TrendDirection::Increasing);
        assert_eq!(trend_direction(5.0), TrendDirection::Stable);
        assert_eq!(trend_direction(-5.0), TrendDirection::Stable);
        assert_eq!(trend_direction(-5.1), TrendDirection::Decreasing);
    }

    #[test]
    fn test_trend_adds_insight() {
        let mut indicators = enrollment_indicators(&enrollment()).unwrap();
        assert!(indicators.trend.is_none());

        indicators.with_trend(EnrollmentTrend::new((9, 1000), (10, 900)));
        let trend = indicators.trend.as_ref().unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!((trend.growth_percent + 10.0).abs() < 1e-9);
        assert_eq!(indicators.insights.len(), 2);
        assert!(indicators.insights[1].starts_with("📉 Declining enrollment trend"));
        assert!(indicators.insights[1].contains("-10.0%"));

        let json = serde_json::to_value(&indicators).unwrap();
        assert_eq!(json["trend"]["direction"], "decreasing");
    }
}
