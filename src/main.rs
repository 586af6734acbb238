//! PDF Form Filler - Entry point
//!
//! Fills a PDF form template once per spreadsheet row.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_form_filler::pdf::{extract_form_fields, load_template};
use pdf_form_filler::{run_batch, BatchConfig, FormMapping, PdfiumFormWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log verbosity (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill the template once per spreadsheet row
    Fill {
        /// Spreadsheet (.xlsx, .xls, .ods, .csv, .tsv)
        #[arg(short, long)]
        data: PathBuf,

        /// PDF form template
        #[arg(short, long)]
        template: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// JSON mapping file (default: built-in Form 8936 Schedule A mapping)
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Worksheet name (default: first sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Password for an encrypted template
        #[arg(long)]
        password: Option<String>,

        /// Transform rows and log the results without writing PDFs
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List the form fields of a template
    Inspect {
        /// PDF form template
        #[arg(short, long)]
        template: PathBuf,

        /// Password for an encrypted template
        #[arg(long)]
        password: Option<String>,

        /// Print fields as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the effective mapping as JSON
    Mapping {
        /// JSON mapping file to validate (default: built-in mapping)
        #[arg(short, long)]
        mapping: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

fn load_mapping(path: Option<&Path>) -> anyhow::Result<FormMapping> {
    match path {
        Some(path) => FormMapping::from_path(path)
            .with_context(|| format!("loading mapping {}", path.display())),
        None => Ok(FormMapping::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pdf_form_filler={}", cli.log_level.as_filter()).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Fill {
            data,
            template,
            output,
            mapping,
            sheet,
            password,
            dry_run,
        } => {
            let mapping = load_mapping(mapping.as_deref())?;
            let config = BatchConfig {
                data_path: data,
                template_path: template,
                output_dir: output,
                sheet,
                dry_run,
            };
            let writer = match password {
                Some(pwd) => PdfiumFormWriter::with_password(pwd),
                None => PdfiumFormWriter::new(),
            };

            tracing::info!("Filling PDF forms with data from {}", config.data_path.display());
            let summary = run_batch(&config, &mapping, &writer)
                .with_context(|| format!("processing {}", config.data_path.display()))?;

            println!(
                "{} rows: {} succeeded, {} failed",
                summary.total(),
                summary.succeeded(),
                summary.failed()
            );
        }
        Command::Inspect {
            template,
            password,
            json,
        } => {
            let data = load_template(&template)?;
            let fields = extract_form_fields(&data, password.as_deref())
                .with_context(|| format!("inspecting {}", template.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else if fields.is_empty() {
                println!("No form fields found in the PDF.");
            } else {
                for field in &fields {
                    let state = match (&field.value, field.is_checked) {
                        (Some(value), _) => format!("{:?}", value),
                        (None, Some(checked)) => format!("checked={}", checked),
                        (None, None) => "-".to_string(),
                    };
                    let flags = match (field.is_read_only, field.is_required) {
                        (true, true) => "read-only,required",
                        (true, false) => "read-only",
                        (false, true) => "required",
                        (false, false) => "-",
                    };
                    println!(
                        "page {:<3} {:<12} {:<40} {:<18} {}",
                        field.page,
                        field.field_type,
                        field.name.as_deref().unwrap_or("<unnamed>"),
                        flags,
                        state
                    );
                }
            }
        }
        Command::Mapping { mapping } => {
            let mapping = load_mapping(mapping.as_deref())?;
            println!("{}", mapping.to_json()?);
        }
    }

    Ok(())
}
