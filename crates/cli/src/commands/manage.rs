//! Management actions for the staff dashboards, plus the health check.
//!
//! Each action passes the gate for the dashboard that owns it and opens
//! that dashboard with a manual schedule, so nothing is polled.
//!
//! # Usage
//!
//! ```bash
//! mw patients add -u P-010 -n "Napat" --age 34
//! mw users delete P-010
//! mw notifications read 42
//! mw report red-cases
//! ```

use mindwatch_console::api::NewPatient;
use mindwatch_console::dashboards::{AdminDashboard, PsychiatristDashboard, TherapistDashboard};
use mindwatch_console::sync::Schedule;
use mindwatch_core::{NotificationId, Role};

use super::{Account, CommandError, Context, parse_user_id};
use crate::output;

/// Enrol a patient from the therapist dashboard.
pub async fn add_patient(ctx: &Context, account: Account) -> Result<(), CommandError> {
    let patient = NewPatient {
        user_id: parse_user_id(&account.user_id)?,
        profile: account.profile,
    };
    let dash = TherapistDashboard::open_with_schedule(
        ctx.gate(Role::Therapist)?,
        &ctx.dashboards,
        Schedule::Manual,
    )?;
    let result = dash.add_patient(&patient).await;
    dash.close();
    result?;

    output::therapist(&dash.summary(), &dash.search(patient.user_id.as_str()));
    Ok(())
}

pub async fn delete_user(ctx: &Context, id: &str) -> Result<(), CommandError> {
    let user_id = parse_user_id(id)?;
    let dash = AdminDashboard::open_with_schedule(
        ctx.gate(Role::Admin)?,
        &ctx.dashboards,
        Schedule::Manual,
    )?;
    let result = dash.delete_user(&user_id).await;
    dash.close();
    result?;
    output::line(&format!("Deleted {user_id}"));
    Ok(())
}

pub async fn mark_read(ctx: &Context, id: i64) -> Result<(), CommandError> {
    let dash = PsychiatristDashboard::open_with_schedule(
        ctx.gate(Role::Psychiatrist)?,
        &ctx.dashboards,
        Schedule::Manual,
    )?;
    let result = dash.mark_read(NotificationId::new(id)).await;
    dash.close();
    result?;
    output::line(&format!("Notification {id} marked read"));
    Ok(())
}

pub async fn red_case_report(ctx: &Context) -> Result<(), CommandError> {
    let dash = PsychiatristDashboard::open_with_schedule(
        ctx.gate(Role::Psychiatrist)?,
        &ctx.dashboards,
        Schedule::Manual,
    )?;
    let report = dash.export_red_cases().await;
    dash.close();
    output::red_case_report(&report?);
    Ok(())
}

pub async fn health(ctx: &Context) -> Result<(), CommandError> {
    let health = ctx.dashboards.api.health().await?;
    output::health(&health);
    Ok(())
}
