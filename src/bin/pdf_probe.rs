//! PDF validation harness
//!
//! Validates one or more PDF files and prints each report as JSON.
//!
//! Usage:
//!   cargo run --bin pdf_probe -- file.pdf
//!   cargo run --bin pdf_probe -- --strict file.pdf other.pdf
//!   cargo run --bin pdf_probe -- --profile tagged --profile pdfa file.pdf
//!   RUST_LOG=debug cargo run --bin pdf_probe -- file.pdf

use pdf_probe::{Analyzer, ProfileKind, ValidationOptions};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    #[serde(flatten)]
    report: &'a pdf_probe::ValidationReport,
}

struct HarnessConfig {
    files: Vec<PathBuf>,
    options: ValidationOptions,
    compact: bool,
}

impl HarnessConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut files = Vec::new();
        let mut strict = false;
        let mut compact = false;
        let mut profiles: Vec<ProfileKind> = Vec::new();
        let mut max_messages = None;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--strict" => strict = true,
                "--compact" => compact = true,
                "--profile" => {
                    i += 1;
                    let name = args.get(i).ok_or("--profile needs a value")?;
                    profiles.push(parse_profile(name)?);
                },
                "--max-messages" => {
                    i += 1;
                    let value = args.get(i).ok_or("--max-messages needs a value")?;
                    max_messages = Some(
                        value
                            .parse::<usize>()
                            .map_err(|e| format!("--max-messages {}: {}", value, e))?,
                    );
                },
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                },
                flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
                path => files.push(PathBuf::from(path)),
            }
            i += 1;
        }

        if files.is_empty() {
            return Err("no input files".to_string());
        }

        let mut options = ValidationOptions::default().with_strict(strict);
        if !profiles.is_empty() {
            options = options.with_profiles(profiles);
        }
        if let Some(max) = max_messages {
            options = options.with_max_messages(max);
        }
        Ok(Self {
            files,
            options,
            compact,
        })
    }
}

fn parse_profile(name: &str) -> Result<ProfileKind, String> {
    match name.to_ascii_lowercase().as_str() {
        "tagged" => Ok(ProfileKind::Tagged),
        "pdfa" | "pdfa1b" | "pdf/a-1b" => Ok(ProfileKind::PdfA1b),
        "linearized" => Ok(ProfileKind::Linearized),
        other => Err(format!("unknown profile {}", other)),
    }
}

fn print_help() {
    println!("Usage: pdf_probe [OPTIONS] FILE...");
    println!();
    println!("Options:");
    println!("  --strict              count recovered syntax problems against validity");
    println!("  --profile NAME        check only the named profile (tagged, pdfa, linearized)");
    println!("  --max-messages N      keep at most N diagnostics per file");
    println!("  --compact             print one JSON object per line");
}

fn main() {
    env_logger::init();

    let config = match HarnessConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run with --help for usage.");
            process::exit(2);
        },
    };

    let analyzer = Analyzer::new(config.options.clone());
    let mut failed = false;
    for path in &config.files {
        let report = match analyzer.analyze_file(path) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                failed = true;
                continue;
            },
        };
        let output = FileReport {
            file: path.display().to_string(),
            report: &report,
        };
        let json = if config.compact {
            serde_json::to_string(&output)
        } else {
            serde_json::to_string_pretty(&output)
        };
        match json {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report for {}: {}", path.display(), e);
                failed = true;
            },
        }
    }

    if failed {
        process::exit(1);
    }
}
