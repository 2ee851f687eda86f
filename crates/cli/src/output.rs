//! Plain-text rendering of command results to stdout.

#![allow(clippy::print_stdout)]

use mindwatch_console::dashboards::{
    AdminSummary, PsychiatristSummary, RedCaseReport, TherapistSummary,
};
use mindwatch_console::feed::Post;
use mindwatch_core::stats::StatusBreakdown;
use mindwatch_core::{
    AnalysisResult, AnalyticsSnapshot, BackendHealth, HistoryEntry, Notification, PatientRecord,
    Role, Session,
};

pub fn route(role: Role, route: &str) {
    println!("{role}\t{route}");
}

pub fn whoami(session: &Session) {
    let role = session.role();
    println!("{}\t{}", session.id(), session.user().display_name());
    route(role, role.route());
}

pub fn line(message: &str) {
    println!("{message}");
}

fn status(status: &StatusBreakdown) {
    println!(
        "status\tgreen={} yellow={} red={} unknown={}",
        status.green, status.yellow, status.red, status.unknown
    );
}

fn analytics(snapshot: Option<&AnalyticsSnapshot>) {
    let Some(snapshot) = snapshot else {
        return;
    };
    for slice in &snapshot.risk_distribution {
        println!("risk\t{}\t{}", slice.name, slice.value);
    }
    if let Some(last) = snapshot.trend_data.last() {
        println!("trend\t{}\t{:.1}", last.date, last.avg_score);
    }
}

pub fn records(records: &[PatientRecord]) {
    for r in records {
        println!(
            "{}\t{}\t{}\t{}",
            r.id,
            r.name,
            r.status,
            r.last_update.as_deref().unwrap_or("-")
        );
    }
}

pub fn admin(summary: &AdminSummary, matches: Option<(&[PatientRecord], usize)>) {
    println!(
        "users\ttotal={} admin={} psychiatrist={} therapist={} patient={}",
        summary.total_users,
        summary.admins,
        summary.psychiatrists,
        summary.therapists,
        summary.patients
    );
    status(&summary.status);
    analytics(summary.analytics.as_ref());
    if let Some((shown, total)) = matches {
        println!("matches\t{} of {total}", shown.len());
        records(shown);
    }
}

pub fn therapist(summary: &TherapistSummary, shown: &[PatientRecord]) {
    println!("patients\ttotal={} critical={}", summary.total, summary.critical);
    status(&summary.status);
    records(shown);
}

pub fn psychiatrist(summary: &PsychiatristSummary, notifications: &[Notification]) {
    println!(
        "red cases\tcount={} average={:.1} critical={}",
        summary.red_cases, summary.average_score, summary.critical
    );
    analytics(summary.analytics.as_ref());
    println!("notifications\tunread={}", summary.unread_notifications);
    for n in notifications {
        println!(
            "{}\t{}\t{}\t{}",
            n.id,
            n.timestamp,
            n.user_id.as_ref().map_or("-", |u| u.as_str()),
            n.message
        );
    }
}

pub fn analysis(result: &AnalysisResult) {
    println!("{}\t{:.1}\t{}", result.level, result.score, result.reason);
    if let Some(recommendation) = &result.recommendation {
        println!("recommendation\t{recommendation}");
    }
    if !result.keywords.is_empty() {
        println!("keywords\t{}", result.keywords.join(", "));
    }
}

pub fn post(post: &Post) {
    let marker = if post.simulated { " (simulated)" } else { "" };
    println!(
        "{}{marker}\t{}",
        post.timestamp.format("%Y-%m-%d %H:%M:%S"),
        post.content
    );
    match &post.result {
        Some(result) => analysis(result),
        None if post.analyzing => println!("analyzing"),
        None => println!("analysis unavailable"),
    }
}

pub fn history(entries: &[HistoryEntry]) {
    for e in entries {
        println!(
            "{}\t{}\t{:.1}\t{}",
            e.timestamp, e.result_level, e.score, e.content
        );
    }
}

pub fn red_case_report(report: &RedCaseReport) {
    println!(
        "Red cases as of {}",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    for case in &report.cases {
        println!(
            "{}\t{}\t{:.1}\t{}",
            case.user_id,
            case.name.as_deref().unwrap_or("-"),
            case.score,
            case.reason
        );
    }
    println!(
        "total={} average={:.1} critical={}",
        report.cases.len(),
        report.average_score,
        report.critical
    );
}

pub fn health(health: &BackendHealth) {
    println!(
        "{}\tai_ready={}\tdb={}",
        health.status,
        health.ai_ready,
        health.db.as_deref().unwrap_or("-")
    );
}
