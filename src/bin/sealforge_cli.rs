//! SealForge CLI - offline seal rendering and usage checks
//!
//! Commands: render, check-usage
//! Outputs SVG or JSON to stdout, logs to stderr
//! Returns non-zero on invalid input or critical anomalies

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sealforge_core::{
    render_seal, Seal, SealConfig, SealUsage, SealVersionSpec, Severity, UsageValidator,
};

#[derive(Parser)]
#[command(name = "sealforge-cli")]
#[command(about = "SealForge CLI - Institutional Seal Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a seal spec to SVG
    Render {
        /// JSON payload (SealVersionSpec)
        #[arg(short, long)]
        payload: String,
    },

    /// Classify a usage of a seal at a point in time
    CheckUsage {
        /// JSON payload (Seal)
        #[arg(short, long)]
        seal: String,

        /// Usage time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,

        /// Document type the seal is applied to
        #[arg(long, default_value = "document")]
        document_type: String,

        /// Document identifier
        #[arg(long, default_value = "cli")]
        document_id: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SealConfig::from_env();

    match cli.command {
        Commands::Render { payload } => {
            let spec: SealVersionSpec = match serde_json::from_str(&payload) {
                Ok(s) => s,
                Err(e) => {
                    println!(r#"{{"success": false, "error": "Invalid payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match render_seal(&spec, &config.layout) {
                Ok(svg) => {
                    println!("{}", svg);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.public_message(),
                    });
                    println!("{}", output);
                    ExitCode::from(2)
                }
            }
        }

        Commands::CheckUsage { seal, at, document_type, document_id } => {
            let seal: Seal = match serde_json::from_str(&seal) {
                Ok(s) => s,
                Err(e) => {
                    println!(r#"{{"valid": false, "error": "Invalid seal: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };
            let used_at = match at.as_deref().map(DateTime::parse_from_rfc3339) {
                None => Utc::now(),
                Some(Ok(t)) => t.with_timezone(&Utc),
                Some(Err(e)) => {
                    println!(r#"{{"valid": false, "error": "Invalid time: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            let usage = SealUsage {
                id: Uuid::new_v4(),
                tenant_id: seal.tenant_id,
                seal_version_id: Uuid::nil(),
                document_type,
                document_id,
                used_by: Uuid::nil(),
                school_id: seal.school_id,
                academic_year_id: seal.academic_year_id,
                used_at,
            };
            let alerts = UsageValidator::new().evaluate(&seal, &usage);
            let critical = alerts.iter().any(|a| a.severity == Severity::Critical);

            let output = serde_json::json!({
                "valid": alerts.is_empty(),
                "usedAt": used_at,
                "alerts": alerts,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            if critical {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
