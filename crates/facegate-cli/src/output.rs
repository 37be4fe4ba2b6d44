use std::error::Error;
use std::io::{self, Write};

use facegate_core::errors::{AppError, AppResult};
use facegate_core::faces::{
    DeletionOutcome, EnrolledIdentities, EnrollmentOutcome, VerificationOutcome,
};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputMode;
use crate::runtime::{IssuedToken, StatusReport};

fn write_json<T: Serialize + ?Sized>(payload: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_enroll(outcome: &EnrollmentOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for line in &outcome.logs {
                println!("{line}");
            }
            println!(
                "Enrollment successful: {} now has {} encoding(s)",
                outcome.identity, outcome.face_count
            );
        }
        OutputMode::Json => write_json(&json!({
            "success": true,
            "identity": outcome.identity,
            "face_count": outcome.face_count,
        }))?,
    }
    Ok(())
}

pub fn render_verify(outcome: &VerificationOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for line in &outcome.logs {
                println!("{line}");
            }
            match &outcome.identity_id {
                Some(identity) if outcome.accepted => {
                    println!("{} ({identity})", outcome.message);
                }
                _ => println!("{}", outcome.message),
            }
        }
        OutputMode::Json => write_json(&json!({
            "success": outcome.accepted,
            "identity_id": outcome.identity_id,
            "confidence": outcome.confidence,
            "distance": outcome.distance,
            "message": outcome.message,
        }))?,
    }
    Ok(())
}

pub fn render_list(listing: &EnrolledIdentities, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if listing.identities.is_empty() {
                println!("No identities enrolled");
            }
            for identity in &listing.identities {
                println!("{identity}");
            }
            println!("Total: {}", listing.total_count);
        }
        OutputMode::Json => write_json(listing)?,
    }
    Ok(())
}

pub fn render_delete(outcome: &DeletionOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!("{}", outcome.message),
        OutputMode::Json => write_json(&json!({
            "success": true,
            "identity": outcome.identity,
            "message": outcome.message,
        }))?,
    }
    Ok(())
}

pub fn render_status(report: &StatusReport, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            match &report.config_source {
                Some(path) => println!("Configuration: {}", path.display()),
                None => println!("Configuration: built-in defaults"),
            }
            println!(
                "Encoding store: {} ({})",
                report.store_dir.display(),
                if report.store_encrypted {
                    "encrypted"
                } else {
                    "plaintext"
                }
            );
            println!(
                "Token authentication: {}",
                if report.token_auth_configured {
                    "configured"
                } else {
                    "not configured"
                }
            );
            println!(
                "Enrolled: {} identit(ies), {} encoding(s)",
                report.stats.identities, report.stats.encodings
            );
            println!(
                "Accept threshold: {}  Max encodings per identity: {}  Dimension: {}",
                report.stats.accept_threshold,
                report.stats.max_encodings_per_identity,
                report.stats.encoding_dimension
            );
        }
        OutputMode::Json => write_json(report)?,
    }
    Ok(())
}

pub fn render_token(issued: &IssuedToken, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!("{}", issued.token),
        OutputMode::Json => write_json(issued)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            if let Ok(json) = serde_json::to_string(&error_payload(err)) {
                println!("{json}");
            }
        }
    }
}

/// JSON body for a failed command. `client_error` tells callers whether
/// retrying with the same input can succeed.
pub fn error_payload(err: &AppError) -> serde_json::Value {
    json!({
        "success": false,
        "error": err.human_message(),
        "client_error": err.is_client_error(),
    })
}
