//! Backend Verification Module
//!
//! Checks a configured backend end to end before monitoring is switched on:
//! both tables must answer, parse, and hold plausible data.
//!
//! Run this after changing the backend URL or key.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ingest::StatusSource;
use crate::ingest::supabase::{DEFAULT_LOG_LIMIT, SupabaseClient};
use crate::model::{DeviceStatus, FireWatchError, LogEntry, SensorReading};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub backend_url: String,
    pub status_table: TableVerification,
    pub logs_table: TableVerification,
    pub overall: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableVerification {
    pub table: String,
    pub status: VerificationStatus,
    pub reachable: bool,
    pub row_count: usize,
    pub device_count: usize,
    pub fire_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl TableVerification {
    fn failed(table: &str, err: &FireWatchError) -> Self {
        TableVerification {
            table: table.to_string(),
            status: VerificationStatus::Failed,
            // A non-2xx answer still proves the host is there.
            reachable: matches!(err, FireWatchError::HttpError(_) | FireWatchError::ParseError(_)),
            row_count: 0,
            device_count: 0,
            fire_count: 0,
            error_message: Some(err.to_string()),
        }
    }
}

// ============================================================================
// Table checks
// ============================================================================

/// Grades the answer of a `status` table query.
///
/// An empty table is only a partial success: the backend works but no sensor
/// has ever reported.
pub fn verify_status_rows(result: Result<Vec<SensorReading>, FireWatchError>) -> TableVerification {
    let rows = match result {
        Ok(rows) => rows,
        Err(e) => return TableVerification::failed("status", &e),
    };

    let devices: HashSet<&str> = rows.iter().map(|r| r.device_id.as_str()).collect();
    let fire_count = rows.iter().filter(|r| r.status == DeviceStatus::Fire).count();
    let unlocated = rows.iter().filter(|r| r.location.is_none()).count();

    let (status, error_message) = if rows.is_empty() {
        (VerificationStatus::PartialSuccess, Some("status table is empty".to_string()))
    } else if unlocated > 0 {
        (
            VerificationStatus::PartialSuccess,
            Some(format!("{} row(s) have no location", unlocated)),
        )
    } else {
        (VerificationStatus::Success, None)
    };

    TableVerification {
        table: "status".to_string(),
        status,
        reachable: true,
        row_count: rows.len(),
        device_count: devices.len(),
        fire_count,
        error_message,
    }
}

/// Grades the answer of a `logs` table query.
pub fn verify_log_rows(result: Result<Vec<LogEntry>, FireWatchError>) -> TableVerification {
    let entries = match result {
        Ok(entries) => entries,
        Err(e) => return TableVerification::failed("logs", &e),
    };

    let devices: HashSet<&str> = entries.iter().map(|e| e.device_id.as_str()).collect();
    let fire_count = entries.iter().filter(|e| e.status == DeviceStatus::Fire).count();

    let (status, error_message) = if entries.is_empty() {
        (VerificationStatus::PartialSuccess, Some("logs table is empty".to_string()))
    } else {
        (VerificationStatus::Success, None)
    };

    TableVerification {
        table: "logs".to_string(),
        status,
        reachable: true,
        row_count: entries.len(),
        device_count: devices.len(),
        fire_count,
        error_message,
    }
}

fn overall(tables: &[&TableVerification]) -> VerificationStatus {
    if tables.iter().all(|t| t.status == VerificationStatus::Success) {
        VerificationStatus::Success
    } else if tables.iter().all(|t| t.status == VerificationStatus::Failed) {
        VerificationStatus::Failed
    } else {
        VerificationStatus::PartialSuccess
    }
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn verify_backend(client: &SupabaseClient) -> VerificationReport {
    println!("🔍 Verifying status table...");
    let status_table = verify_status_rows(client.fetch_status());

    println!("🔍 Verifying logs table...");
    let logs_table = verify_log_rows(client.fetch_logs(DEFAULT_LOG_LIMIT));

    let overall = overall(&[&status_table, &logs_table]);
    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        backend_url: client.base_url().to_string(),
        status_table,
        logs_table,
        overall,
    }
}

fn print_table(table: &TableVerification) {
    match table.status {
        VerificationStatus::Success => println!(
            "  {:<8} ✓ OK ({} rows, {} devices, {} fire)",
            table.table, table.row_count, table.device_count, table.fire_count
        ),
        VerificationStatus::PartialSuccess => println!(
            "  {:<8} ⚠ Partial: {}",
            table.table,
            table.error_message.as_deref().unwrap_or("Unknown")
        ),
        VerificationStatus::Failed => println!(
            "  {:<8} ✗ FAILED: {}",
            table.table,
            table.error_message.as_deref().unwrap_or("Unknown")
        ),
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Backend: {}", report.backend_url);
    print_table(&report.status_table);
    print_table(&report.logs_table);
    println!();
    println!("Overall: {:?}", report.overall);
    println!("═══════════════════════════════════════════════════════════");
}
