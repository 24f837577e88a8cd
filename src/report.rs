//! Plain-text rendering of progress, test records and final reports.

use crate::model::{ProgressSnapshot, Report, TestRecord};

/// One-line progress summary for a snapshot.
pub fn format_progress(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{} requests ({} ok, {} failed, {:.1}% success), target users: {}",
        snapshot.total_requests,
        snapshot.succeeded_requests,
        snapshot.failed_requests,
        snapshot.success_rate() * 100.0,
        snapshot.target_users,
    )
}

/// Render a response time given in seconds, switching to ms below one second.
fn format_seconds(secs: f64) -> String {
    if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}ms", secs * 1000.0)
    }
}

/// Metric table for a finished test's report.
pub fn format_report(report: &Report) -> String {
    let rows = [
        ("Average Response Time", format_seconds(report.average_response_time)),
        ("Peak Response Time", format_seconds(report.peak_response_time)),
        ("Error Rate", format!("{:.2}%", report.error_rate)),
        ("Throughput", format!("{:.2} req/s", report.throughput)),
        ("50th Percentile", format_seconds(report.p50)),
        ("90th Percentile", format_seconds(report.p90)),
        ("99th Percentile", format_seconds(report.p99)),
    ];

    let mut out = String::new();
    for (metric, value) in rows {
        out.push_str(&format!("{:<25} | {}\n", metric, value));
    }
    out
}

/// Details block for the results surface: test parameters, request
/// breakdown, then the report once the test is done and the service has
/// filled it in.
pub fn format_record(record: &TestRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Test:      {}\n", record.uuid));
    out.push_str(&format!("URL:       {}\n", record.url));
    out.push_str(&format!("Method:    {}\n", record.method));
    out.push_str(&format!("Status:    {}\n", display_status(record)));
    if let Some(created) = record.created_at {
        out.push_str(&format!("Created:   {}\n", created.to_rfc3339()));
    }
    out.push_str(&format!(
        "Ramp:      {} -> {} users over {} min\n",
        record.users_to_start_with, record.target_users, record.reach_peak_after_in_minutes
    ));
    out.push_str(&format!(
        "Requests:  {} total, {} succeeded, {} failed\n",
        record.total_requests,
        record.succeeded_requests,
        record.failed_requests()
    ));

    match record.final_report() {
        Some(report) => {
            out.push('\n');
            out.push_str(&format_report(report));
        }
        None => out.push_str("\nNo report available yet.\n"),
    }
    out
}

/// Table of tests for `loadctl list`.
pub fn format_record_table(records: &[TestRecord]) -> String {
    if records.is_empty() {
        return "No tests found.\n".to_string();
    }

    let mut out = format!(
        "{:<36} | {:<6} | {:<12} | {:>8} | {}\n",
        "ID", "Method", "Status", "Users", "URL"
    );
    out.push_str(&format!(
        "{:-<36}-|-{:-<6}-|-{:-<12}-|-{:->8}-|-{:-<30}\n",
        "", "", "", "", ""
    ));
    for rec in records {
        out.push_str(&format!(
            "{:<36} | {:<6} | {:<12} | {:>8} | {}\n",
            rec.uuid,
            rec.method,
            display_status(rec),
            rec.target_users,
            rec.url
        ));
    }
    out
}

fn display_status(record: &TestRecord) -> String {
    let s = record.status.to_string();
    if s.is_empty() {
        "-".to_string()
    } else {
        s
    }
}
