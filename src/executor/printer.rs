use colored::{Color, Colorize};

use crate::audit::StoredCallRecord;
use crate::response::Outcome;

use super::models::Method;

fn status_color(status: Option<u16>) -> Color {
    match status {
        Some(status) if status >= 400 => Color::Red,
        Some(status) if status >= 300 => Color::Yellow,
        Some(_) => Color::Green,
        None => Color::Red,
    }
}

pub fn print_outcome(method: Method, url: &str, outcome: &Outcome) {
    println!("{} {}", method.as_str().bold(), url.cyan());

    let status = outcome
        .status_code()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "no response".to_string());
    let verdict = if outcome.is_success() { "success" } else { "failure" };
    println!(
        "{} {} {}",
        "Status:".bold(),
        status.color(status_color(outcome.status_code())),
        format!("({verdict})").dimmed()
    );

    if let Some(message) = outcome.message() {
        println!("{} {}", "Message:".bold(), message);
    }

    if let Some(errors) = outcome.errors() {
        println!("{} {}", "Errors:".bold(), errors.to_string().dimmed());
    }

    if let Some(meta) = outcome.meta() {
        println!("{} {}", "Meta:".bold(), meta.to_string().dimmed());
    }

    if let Some(data) = outcome.data() {
        println!("{}", "Data".bold());
        println!(
            "{}",
            serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string())
        );
    }
}

pub fn print_audit_records(records: &[StoredCallRecord]) {
    if records.is_empty() {
        println!("{}", "No audit records".dimmed());
        return;
    }

    for record in records {
        let status = record
            .response_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "---".to_string());
        println!(
            "{} {} {} {} {}",
            format!("#{}", record.id).dimmed(),
            record.created_at.dimmed(),
            record.method.bold(),
            status.color(status_color(record.response_status)),
            record.endpoint.cyan()
        );

        let duration = record
            .duration_ms
            .map(|d| format!("{d} ms"))
            .unwrap_or_default();
        let operation = record.operation.as_deref().unwrap_or("-");
        println!("    {} {}", operation, duration.dimmed());

        if let Some(error) = &record.error_message {
            println!("    {} {}", "error:".red(), error);
        }
    }
}
