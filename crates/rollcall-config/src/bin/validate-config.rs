//! Config validation CLI tool
//!
//! Validates a rollcall configuration file and reports any errors.

use rollcall_config::{CURRENT_CONFIG_VERSION, ConfigError};
use rollcall_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a rollcall configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match rollcall_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Dwell required: {}", format_duration(settings.engine.dwell_required));
            println!(
                "  Gate: {} lead-in, {} grace",
                format_duration(settings.engine.lead_in),
                format_duration(settings.engine.grace_out)
            );
            println!("  Meetings: {}", settings.meetings.len());

            if !settings.meetings.is_empty() {
                println!();
                println!("Meetings:");
                for meeting in &settings.meetings {
                    println!(
                        "  - {} [{} {}-{}, {}m]: {}",
                        meeting.id,
                        meeting.weekday,
                        meeting.start,
                        meeting.end,
                        meeting.radius_meters,
                        meeting.name
                    );
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
