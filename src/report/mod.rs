//! Rendering of loaded forms.

pub mod builder;
pub mod generator;

pub use builder::build_report;
pub use generator::{
    generate_json_report, generate_markdown_report, generate_regional_markdown,
    generate_status_markdown, write_report,
};
