//! Markdown and JSON report generation.
//!
//! This module renders a [`FormReport`] as a Markdown document for people
//! or as pretty JSON for tools and the narrative service.

use crate::analysis::{EnrollmentIndicators, GenderSplit};
use crate::models::{FormReport, ReportMetadata, Scope, Section, TableReport};
use crate::overview::{FormStatus, RegionalSummary};
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &FormReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", report.metadata.title));
    output.push_str(&generate_metadata_section(&report.metadata));

    if let Some(ref indicators) = report.indicators {
        output.push_str(&generate_indicators_section(indicators));
    }

    for table in &report.tables {
        output.push_str(&generate_table_section(table));
    }

    output.push_str(&generate_footer());
    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Form:** `{}`\n", metadata.form));
    section.push_str(&format!("- **Country ID:** {}\n", metadata.scope.country_id));
    section.push_str(&format!(
        "- **Academic Year ID:** {}\n",
        metadata.scope.academic_year_id
    ));
    match metadata.last_saved {
        Some(saved) => section.push_str(&format!(
            "- **Last Saved:** {}\n",
            saved.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        None => section.push_str("- **Last Saved:** never\n"),
    }
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

fn generate_indicators_section(indicators: &EnrollmentIndicators) -> String {
    let mut section = String::new();

    section.push_str("## Indicators\n\n");
    section.push_str("| Level | Male | Female | Total | Public | Private | GPI | Status |\n");
    section.push_str("|:---|---:|---:|---:|---:|---:|---:|:---|\n");
    for level in &indicators.levels {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {:.2} | {} {} |\n",
            level.level,
            level.split.male,
            level.split.female,
            level.split.total,
            level.public,
            level.private,
            level.split.gpi,
            level.split.status.emoji(),
            level.split.status
        ));
    }
    section.push_str(&format!(
        "| **All levels** | **{}** | **{}** | **{}** | | | **{:.2}** | {} {} |\n\n",
        indicators.overall.male,
        indicators.overall.female,
        indicators.overall.total,
        indicators.overall.gpi,
        indicators.overall.status.emoji(),
        indicators.overall.status
    ));

    if let Some(ref trend) = indicators.trend {
        section.push_str(&format!(
            "**Trend:** {} students in year {} against {} in year {} ({:+.1}%)\n\n",
            trend.current_total,
            trend.current_year_id,
            trend.previous_total,
            trend.previous_year_id,
            trend.growth_percent
        ));
    }

    if !indicators.insights.is_empty() {
        section.push_str("### Insights\n\n");
        for insight in &indicators.insights {
            section.push_str(&format!("- {}\n", insight));
        }
        section.push('\n');
    }

    section
}

fn generate_table_section(table: &TableReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", table.title));
    section.push_str(&format!("**Grand total:** {}", table.grand_total));
    if let Some(ref gender) = table.gender {
        section.push_str(&format!(" ({})", gender_line(gender)));
    }
    section.push_str("\n\n");

    for block in &table.sections {
        section.push_str(&generate_grid(block));
    }

    section
}

fn gender_line(gender: &GenderSplit) -> String {
    format!(
        "male {}, female {}, GPI {:.2}",
        gender.male, gender.female, gender.gpi
    )
}

/// Render one section as a Markdown table with a totals row.
fn generate_grid(section: &Section) -> String {
    let mut grid = String::new();

    grid.push_str(&format!("### {}\n\n", section.heading));
    if section.rows.is_empty() {
        grid.push_str("*No data entered.*\n\n");
        return grid;
    }

    let header = if section.row_header.is_empty() {
        " "
    } else {
        section.row_header.as_str()
    };
    grid.push_str(&format!("| {} |", header));
    for column in &section.columns {
        grid.push_str(&format!(" {} |", column));
    }
    grid.push_str(" **Total** |\n");

    grid.push_str("|:---|");
    for _ in 0..=section.columns.len() {
        grid.push_str("---:|");
    }
    grid.push('\n');

    for row in &section.rows {
        grid.push_str(&format!("| {} |", row.label));
        for value in &row.values {
            grid.push_str(&format!(" {} |", value));
        }
        grid.push_str(&format!(" **{}** |\n", row.total));
    }

    grid.push_str("| **Total** |");
    for total in &section.column_totals {
        grid.push_str(&format!(" **{}** |", total));
    }
    grid.push_str(&format!(" **{}** |\n\n", section.total));

    grid
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by edustat v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Worksheet status hub of one scope.
pub fn generate_status_markdown(scope: Scope, statuses: &[FormStatus]) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Worksheet Status\n\n{}\n\n", scope));
    output.push_str("| Form | Title | Tables with data | Status |\n");
    output.push_str("|:---|:---|---:|:---|\n");
    for status in statuses {
        output.push_str(&format!(
            "| `{}` | {} | {}/{} | {} {} |\n",
            status.form,
            status.title,
            status.tables_with_data,
            status.tables,
            status.status.emoji(),
            status.status
        ));
    }
    output.push('\n');

    output.push_str(&generate_footer());
    output
}

/// Institution totals across countries.
pub fn generate_regional_markdown(summary: &RegionalSummary) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Regional Institutions\n\n- **Academic Year ID:** {}\n- **Countries reporting:** {}\n\n",
        summary.academic_year_id,
        summary.countries.len()
    ));

    if summary.countries.is_empty() {
        output.push_str("*No institutions entered for this academic year.*\n\n");
    } else {
        output.push_str("## By Level\n\n| Level | Institutions |\n|:---|---:|\n");
        for level in &summary.levels {
            output.push_str(&format!("| {} | {} |\n", level.level, level.total));
        }
        output.push_str(&format!("| **Total** | **{}** |\n\n", summary.total));

        output.push_str("## By Country\n\n| Country ID | Institutions |\n|:---|---:|\n");
        for country in &summary.countries {
            output.push_str(&format!("| {} | {} |\n", country.country_id, country.total));
        }
        output.push('\n');
    }

    output.push_str(&generate_footer());
    output
}

/// Generate a JSON report.
pub fn generate_json_report<T: Serialize + ?Sized>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
