//! Turns a loaded session into a [`FormReport`].
//!
//! Each block of a table becomes one section: single-valued dimensions form
//! the heading, multi-valued ones label the rows and the last dimension
//! gives the columns. Row totals come from [`Sheet::row_total`].

use crate::analysis::{enrollment_indicators, GenderSplit};
use crate::error::SchemaError;
use crate::models::{FormReport, ReportMetadata, Section, SectionRow, TableReport};
use crate::session::FormSession;
use crate::store::SurveyStore;
use crate::survey::key::{CellKey, Selector};
use crate::survey::schema::{Block, FormKind, GENDER};
use crate::survey::sheet::Sheet;
use chrono::Utc;
use std::iter::once;

/// Build the report for everything currently held by `session`.
pub fn build_report<S: SurveyStore>(
    session: &FormSession<S>,
    include_empty_rows: bool,
) -> Result<FormReport, SchemaError> {
    let form = session.form();

    let tables = session
        .sheets()
        .iter()
        .map(|sheet| table_report(sheet, include_empty_rows))
        .collect::<Result<Vec<_>, _>>()?;

    let indicators = match form.kind {
        FormKind::Enrollment => Some(enrollment_indicators(session.sheet("student_enrollment")?)?),
        _ => None,
    };

    Ok(FormReport {
        metadata: ReportMetadata {
            form: form.kind.to_string(),
            title: form.title.to_string(),
            scope: session.scope(),
            generated_at: Utc::now(),
            last_saved: session.last_saved(),
            source: session.store().describe(),
        },
        tables,
        indicators,
    })
}

fn table_report(sheet: &Sheet, include_empty_rows: bool) -> Result<TableReport, SchemaError> {
    let schema = sheet.schema();
    let gender = if schema.has_gender() {
        Some(GenderSplit::new(
            sheet.column_total(GENDER, "male")?,
            sheet.column_total(GENDER, "female")?,
        ))
    } else {
        None
    };

    let sections = schema
        .blocks
        .iter()
        .map(|block| block_section(sheet, block, include_empty_rows))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TableReport {
        name: schema.name.to_string(),
        title: humanize(schema.name),
        grand_total: sheet.grand_total(),
        gender,
        sections,
    })
}

fn block_section(
    sheet: &Sheet,
    block: &Block,
    include_empty_rows: bool,
) -> Result<Section, SchemaError> {
    let schema = sheet.schema();
    let axes = block.axes();
    let last = schema.arity() - 1;
    let columns: Vec<String> = axes[last].iter().map(|v| v.to_string()).collect();

    let heading_parts: Vec<String> = (0..last)
        .filter(|&i| axes[i].len() == 1 && schema.dimensions[i].null_sentinel != Some(axes[i][0]))
        .map(|i| humanize(axes[i][0]))
        .collect();
    let heading = if heading_parts.is_empty() {
        humanize(schema.name)
    } else {
        heading_parts.join(" / ")
    };

    let row_dims: Vec<usize> = (0..last).filter(|&i| axes[i].len() > 1).collect();
    let row_header = row_dims
        .iter()
        .map(|&i| humanize(schema.dimensions[i].name))
        .collect::<Vec<_>>()
        .join(" / ");

    let mut rows = Vec::new();
    let mut column_totals = vec![0u64; columns.len()];

    // Cells come last-dimension-fastest, so each run of `columns.len()`
    // cells shares one row prefix.
    for cell in block.cells().iter().step_by(columns.len().max(1)) {
        let prefix = cell.prefix();
        let selector = schema
            .dimensions
            .iter()
            .zip(prefix)
            .fold(Selector::new(), |s, (d, v)| s.with(d.name, v));
        let total = sheet.row_total(&selector)?;
        if total == 0 && !include_empty_rows {
            continue;
        }

        let values: Vec<u64> = columns
            .iter()
            .map(|c| sheet.get(&CellKey::new(prefix.iter().cloned().chain(once(c.clone())))))
            .collect();
        for (sum, v) in column_totals.iter_mut().zip(&values) {
            *sum += v;
        }

        let label = if row_dims.is_empty() {
            "Total".to_string()
        } else {
            row_dims
                .iter()
                .map(|&i| prefix[i].clone())
                .collect::<Vec<_>>()
                .join(" / ")
        };
        rows.push(SectionRow {
            label,
            values,
            total,
        });
    }

    let total = column_totals.iter().sum();
    Ok(Section {
        heading,
        row_header,
        columns,
        rows,
        column_totals,
        total,
    })
}

/// `post_secondary` -> `Post secondary`.
pub fn humanize(value: &str) -> String {
    let spaced = value.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
