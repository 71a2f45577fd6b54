// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fily: convert anything to PDF.
//
// Entry point. Initialises logging, loads configuration, builds the backend
// services and dispatches the requested command.

mod services;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use fily_core::types::{
    BatchMergeSpec, ConversionOutcome, ConversionRequest, ImageConversionSpec, ImageTarget, Quality,
    supported_extensions,
};
use fily_core::{FilyError, human_errors::humanize_error};
use serde_json::json;

use services::app_services::{AppServices, ENGINE_ENV};

#[derive(Parser)]
#[command(name = "fily")]
#[command(version)]
#[command(about = "Convert documents, spreadsheets, images, markup and code to PDF", long_about = None)]
struct Cli {
    /// Converter configuration file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Office engine binary (libreoffice, soffice, ...)
    #[arg(long, global = true, env = ENGINE_ENV, value_name = "BINARY")]
    engine: Option<PathBuf>,

    /// Never call the office engine; use built-in renderers only
    #[arg(long, global = true)]
    no_engine: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files to PDF
    Convert {
        /// Input files
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to each input's directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Protect every output PDF with this password
        #[arg(long)]
        password: Option<String>,

        /// Page size tier for the built-in renderers
        #[arg(long, value_enum)]
        quality: Option<QualityArg>,

        /// Conversions to run at once
        #[arg(short, long, default_value = "4")]
        jobs: usize,
    },

    /// Merge PDFs into one document
    Merge {
        /// Input PDFs, in order
        #[arg(value_name = "PDF", required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Zero-based reordering of the inputs (e.g. "1,0")
        #[arg(long, value_delimiter = ',')]
        order: Option<Vec<usize>>,

        /// Password for an encrypted input, as PATH=PASSWORD (repeatable)
        #[arg(long = "password", value_name = "PATH=PASSWORD", value_parser = parse_password)]
        passwords: Vec<(PathBuf, String)>,
    },

    /// Place images on PDF pages, one per page
    Images {
        /// Input images, in page order
        #[arg(value_name = "IMAGE", required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Page size tier (high = A4, standard = Letter)
        #[arg(long, value_enum, default_value = "high")]
        quality: QualityArg,
    },

    /// Convert an image to another format
    Image {
        /// Input image
        #[arg(value_name = "IMAGE")]
        input: PathBuf,

        /// Output file (the extension is replaced to match the format)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Target format: jpg, png, bmp, gif, tiff, webp, ico, pdf or eps
        #[arg(short, long)]
        format: String,

        /// Encoder quality, 0-100
        #[arg(long, default_value = "90", value_parser = clap::value_parser!(u8).range(0..=100))]
        quality: u8,
    },

    /// List supported input extensions by family
    Formats,

    /// Check whether the office engine is usable
    Health,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum QualityArg {
    /// A4 pages
    High,
    /// Letter pages
    Standard,
}

impl From<QualityArg> for Quality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::High => Quality::High,
            QualityArg::Standard => Quality::Standard,
        }
    }
}

fn parse_password(raw: &str) -> std::result::Result<(PathBuf, String), String> {
    match raw.split_once('=') {
        Some((path, password)) if !path.is_empty() => Ok((PathBuf::from(path), password.to_string())),
        _ => Err(format!("expected PATH=PASSWORD, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Formats = cli.command {
        print_formats();
        return ExitCode::SUCCESS;
    }

    let services = match AppServices::init(cli.config.as_deref(), cli.engine, cli.no_engine) {
        Ok(services) => services,
        Err(err) => {
            tracing::error!(error = %err, "cannot initialise");
            eprintln!("fily: {}", humanize_error(&err).message);
            return ExitCode::from(2);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Fily starting");
    run(cli.command, services).await
}

async fn run(command: Commands, services: AppServices) -> ExitCode {
    match command {
        Commands::Convert {
            inputs,
            output,
            password,
            quality,
            jobs,
        } => {
            let quality = quality.map_or(services.config().default_quality, Quality::from);
            let requests = inputs
                .iter()
                .map(|input| {
                    let target = pdf_path_for(input, output.as_deref(), password.is_some());
                    ConversionRequest::new(input, target, display_name(input))
                        .with_password(password.clone())
                        .with_quality(quality)
                })
                .collect();

            let reports = services.convert_all(requests, jobs).await;
            let mut failed = 0;
            for report in &reports {
                if !report.outcome.success {
                    failed += 1;
                }
                print_json(&report);
            }
            tracing::info!(total = reports.len(), failed, "batch finished");
            exit_code(failed == 0 && reports.len() == inputs.len())
        }

        Commands::Merge {
            inputs,
            output,
            order,
            passwords,
        } => {
            let spec = BatchMergeSpec {
                ordered_paths: inputs,
                order,
                passwords: passwords.into_iter().collect(),
            };
            let outcome = blocking(move || services.converter().merge(&spec, &output)).await;
            finish(outcome)
        }

        Commands::Images {
            inputs,
            output,
            quality,
        } => {
            let outcome =
                blocking(move || services.converter().images_to_pdf(&inputs, &output, quality.into()))
                    .await;
            finish(outcome)
        }

        Commands::Image {
            input,
            output,
            format,
            quality,
        } => {
            let target = match format.parse::<ImageTarget>() {
                Ok(target) => target,
                Err(err) => return finish(ConversionOutcome::failed(&err)),
            };
            let spec = ImageConversionSpec {
                source_path: input,
                target_format: target,
                quality,
            };
            let outcome = blocking(move || services.converter().convert_image(&spec, &output)).await;
            finish(outcome)
        }

        Commands::Health => {
            let config = services.config().clone();
            let available = blocking(move || services.converter().engine().probe()).await;
            print_json(&json!({
                "engine": config.engine_binary,
                "engine_enabled": config.engine_enabled,
                "engine_available": available,
                "engine_timeout_secs": config.engine_timeout_secs,
                "fallback_renderers": true,
            }));
            exit_code(available || !config.engine_enabled)
        }

        Commands::Formats => {
            print_formats();
            ExitCode::SUCCESS
        }
    }
}

/// Run blocking pipeline work off the async executor.
async fn blocking<T, F>(work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static + From<Panicked>,
{
    tokio::task::spawn_blocking(work).await.unwrap_or_else(|err| {
        tracing::error!(error = %err, "worker panicked");
        T::from(Panicked)
    })
}

/// Marker for a blocking task that did not return.
struct Panicked;

impl From<Panicked> for ConversionOutcome {
    fn from(_: Panicked) -> Self {
        ConversionOutcome::failed(&FilyError::render("internal error"))
    }
}

impl From<Panicked> for bool {
    fn from(_: Panicked) -> Self {
        false
    }
}

/// `<dir>/<stem>.pdf`, next to the input when no directory is given. A PDF
/// input that would map onto itself gets a `.protected` or `.copy` suffix.
fn pdf_path_for(input: &Path, output_dir: Option<&Path>, protected: bool) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let named = |suffix: &str| {
        let mut name = stem.to_os_string();
        name.push(suffix);
        match output_dir {
            Some(dir) => dir.join(name),
            None => input.with_file_name(name),
        }
    };
    let target = named(".pdf");
    if target != input {
        return target;
    }
    named(if protected { ".protected.pdf" } else { ".copy.pdf" })
}

fn display_name(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_formats() {
    let mut families: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (extension, family) in supported_extensions() {
        families.entry(family.name()).or_default().push(extension);
    }
    print_json(&families);
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::error!(error = %err, "cannot serialise report"),
    }
}

fn finish(outcome: ConversionOutcome) -> ExitCode {
    print_json(&outcome);
    exit_code(outcome.success)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
