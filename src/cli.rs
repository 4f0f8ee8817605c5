//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::StoreBackend;
use crate::narrative::LlmProvider;
use crate::survey::FormKind;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// edustat - education statistics data entry and insights
///
/// Enter survey counts for one country and academic year, review the
/// aggregated tables, and ask an LLM for narrative insights.
///
/// Examples:
///   edustat forms
///   edustat --country 3 --year 10 show --form enrollment
///   edustat --country 3 set --form population --cell "6,male=412" --cell "6,female=398"
///   edustat --country 3 ask --form enrollment "Where is gender parity weakest?"
///   edustat --country 3 status
///   edustat --year 10 regional --format json
///   edustat init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .edustat.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Country ID of the scope
    #[arg(long, value_name = "ID", env = "EDUSTAT_COUNTRY_ID", global = true)]
    pub country: Option<i64>,

    /// Academic year ID of the scope
    ///
    /// Defaults to the config value, then to the active academic year.
    #[arg(long, value_name = "ID", env = "EDUSTAT_ACADEMIC_YEAR_ID", global = true)]
    pub year: Option<i64>,

    /// Storage backend
    #[arg(long, value_name = "BACKEND", env = "EDUSTAT_STORE", global = true)]
    pub store: Option<StoreBackend>,

    /// Data directory for the file backend
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the REST backend (a Supabase project URL)
    #[arg(long, value_name = "URL", env = "SUPABASE_URL", global = true)]
    pub rest_url: Option<String>,

    /// API key for the REST backend
    #[arg(
        long,
        value_name = "KEY",
        env = "SUPABASE_ANON_KEY",
        hide_env_values = true,
        global = true
    )]
    pub rest_key: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the survey forms, their tables and dimensions
    Forms,

    /// Load a form and render it with all totals
    Show {
        /// Form to show
        #[arg(short, long, value_enum)]
        form: FormKind,

        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include rows whose total is zero
        #[arg(long)]
        include_empty: bool,
    },

    /// Enter counts and save the form
    ///
    /// Each --cell names the dimension values in table order followed by
    /// the count, e.g. "primary,public,6,G1,male=12". Counts that are not
    /// plain non-negative integers are read as 0 (or their leading digits).
    Set {
        /// Form to edit
        #[arg(short, long, value_enum)]
        form: FormKind,

        /// Table within the form (defaults to the form's first table)
        #[arg(short, long, value_name = "TABLE")]
        table: Option<String>,

        /// Cell assignment "v1,...,vn=COUNT" (repeatable)
        #[arg(long = "cell", value_name = "CELL", required = true, value_parser = parse_cell)]
        cells: Vec<CellAssignment>,
    },

    /// Ask a question about a form's data
    Ask {
        /// Form whose data is sent as context
        #[arg(short, long, value_enum)]
        form: FormKind,

        /// The question
        question: String,

        /// Chat endpoint dialect
        #[arg(long, value_name = "PROVIDER", env = "EDUSTAT_LLM_PROVIDER")]
        provider: Option<LlmProvider>,

        /// Model name
        #[arg(short, long, env = "EDUSTAT_LLM_MODEL")]
        model: Option<String>,

        /// Chat endpoint base URL
        #[arg(long, value_name = "URL", env = "EDUSTAT_LLM_URL")]
        llm_url: Option<String>,

        /// API key for the chat endpoint
        #[arg(long, value_name = "KEY", env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Temperature for LLM responses (0.0 - 1.0)
        #[arg(long)]
        temperature: Option<f32>,

        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Show which worksheets of the scope have data entered
    Status {
        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,
    },

    /// Sum institutions across every country for the academic year
    Regional {
        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,
    },

    /// Generate a default .edustat.toml configuration file
    InitConfig,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// One `--cell` argument: dimension values plus the raw count text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAssignment {
    pub values: Vec<String>,
    pub raw: String,
}

/// Parse `"v1,...,vn=COUNT"`. The count is kept raw for coercion later.
pub fn parse_cell(s: &str) -> Result<CellAssignment, String> {
    let (dims, raw) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected 'v1,...,vn=COUNT', got '{}'", s))?;

    let values: Vec<String> = dims.split(',').map(|v| v.trim().to_string()).collect();
    if values.iter().any(|v| v.is_empty()) {
        return Err(format!("empty dimension value in '{}'", s));
    }

    Ok(CellAssignment {
        values,
        raw: raw.trim().to_string(),
    })
}

fn check_url(url: &str, what: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("{} must start with 'http://' or 'https://'", what))
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if matches!(self.country, Some(id) if id <= 0) {
            return Err("Country ID must be positive".to_string());
        }
        if matches!(self.year, Some(id) if id <= 0) {
            return Err("Academic year ID must be positive".to_string());
        }

        if let Some(ref url) = self.rest_url {
            check_url(url, "REST URL")?;
        }

        if let Command::Ask {
            question,
            llm_url,
            temperature,
            timeout,
            ..
        } = &self.command
        {
            if question.trim().is_empty() {
                return Err("Question must not be empty".to_string());
            }
            if let Some(url) = llm_url {
                check_url(url, "LLM URL")?;
            }
            if let Some(t) = temperature {
                if !(0.0..=1.0).contains(t) {
                    return Err("Temperature must be between 0.0 and 1.0".to_string());
                }
            }
            if *timeout == Some(0) {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            config: None,
            country: Some(3),
            year: Some(10),
            store: None,
            data_dir: None,
            rest_url: None,
            rest_key: None,
            verbose: false,
            quiet: false,
            command,
        }
    }

    fn ask(question: &str) -> Command {
        Command::Ask {
            form: FormKind::Enrollment,
            question: question.to_string(),
            provider: None,
            model: None,
            llm_url: None,
            api_key: None,
            temperature: None,
            timeout: None,
        }
    }

    #[test]
    fn test_parse_cell() {
        let cell = parse_cell("primary, public,6,G1,male=12").unwrap();
        assert_eq!(cell.values, vec!["primary", "public", "6", "G1", "male"]);
        assert_eq!(cell.raw, "12");

        let cell = parse_cell("6,female=").unwrap();
        assert_eq!(cell.raw, "");

        assert!(parse_cell("6,female").is_err());
        assert!(parse_cell("6,,female=3").is_err());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "edustat",
            "--country",
            "4",
            "set",
            "--form",
            "population",
            "--cell",
            "6,male=412",
            "--cell",
            "6,female=398",
        ])
        .unwrap();
        assert_eq!(args.country, Some(4));
        match args.command {
            Command::Set { form, cells, table } => {
                assert_eq!(form, FormKind::Population);
                assert!(table.is_none());
                assert_eq!(cells.len(), 2);
                assert_eq!(cells[1].raw, "398");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_form_names() {
        let args =
            Args::try_parse_from(["edustat", "show", "--form", "staff-qualifications", "-q"])
                .unwrap();
        assert!(args.quiet);
        assert!(matches!(
            args.command,
            Command::Show {
                form: FormKind::StaffQualifications,
                ..
            }
        ));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::Forms);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ids_and_urls() {
        let mut args = make_args(Command::Forms);
        assert!(args.validate().is_ok());

        args.country = Some(0);
        assert!(args.validate().is_err());

        args.country = Some(1);
        args.rest_url = Some("example.supabase.co".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ask() {
        assert!(make_args(ask("How balanced is enrollment?")).validate().is_ok());
        assert!(make_args(ask("   ")).validate().is_err());

        let mut args = make_args(ask("q"));
        if let Command::Ask { temperature, .. } = &mut args.command {
            *temperature = Some(1.5);
        }
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::Forms);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_overview_commands() {
        let args = Args::try_parse_from(["edustat", "--country", "3", "status"]).unwrap();
        assert!(matches!(args.command, Command::Status { format: None }));

        let args =
            Args::try_parse_from(["edustat", "regional", "--year", "10", "--format", "json"])
                .unwrap();
        assert_eq!(args.year, Some(10));
        assert!(matches!(
            args.command,
            Command::Regional {
                format: Some(OutputFormat::Json)
            }
        ));
    }
}
