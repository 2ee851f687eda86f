//! `mw watch`: follow a dashboard from the terminal.
//!
//! Without `--once` the dashboard's sync group runs on its normal cadence
//! and the summary is printed after every cache change until Ctrl-C. With
//! `--once` a single round is fetched and printed.

use std::time::Duration;

use mindwatch_console::dashboards::{
    AdminDashboard, LiveView, PatientDashboard, PsychiatristDashboard, TherapistDashboard,
};
use mindwatch_console::sync::Schedule;
use mindwatch_core::{Role, stats};
use tokio::sync::watch;
use tracing::{info, warn};

use super::{CommandError, Context};
use crate::output;

pub async fn run(
    ctx: &Context,
    role: Role,
    search: Option<&str>,
    once: bool,
) -> Result<(), CommandError> {
    let admitted = ctx.gate(role)?;
    let dashboards = &ctx.dashboards;
    let intervals = dashboards.intervals;

    match role {
        Role::Admin => {
            let dash = AdminDashboard::open_with_schedule(
                admitted,
                dashboards,
                schedule(once, Some(intervals.patients)),
            )?;
            follow(dash.view(), once, || {
                let shown = search.map(|term| (dash.search(term), dash.match_count(term)));
                output::admin(
                    &dash.summary(),
                    shown.as_ref().map(|(users, total)| (users.as_slice(), *total)),
                );
            })
            .await;
        }
        Role::Therapist => {
            let dash = TherapistDashboard::open_with_schedule(
                admitted,
                dashboards,
                schedule(once, None),
            )?;
            follow(dash.view(), once, || {
                let shown = dash.search(search.unwrap_or_default());
                output::therapist(&dash.summary(), &shown);
            })
            .await;
        }
        Role::Psychiatrist => {
            let dash = PsychiatristDashboard::open_with_schedule(
                admitted,
                dashboards,
                schedule(once, Some(intervals.cases)),
            )?;
            follow(dash.view(), once, || {
                let notifications = dash.view().with(|cache| {
                    stats::window(cache.notifications(), dashboards.page_size).to_vec()
                });
                output::psychiatrist(&dash.summary(), &notifications);
            })
            .await;
        }
        Role::Patient => {
            // The patient dashboard has no sync group; show the history instead
            let dash = PatientDashboard::open(admitted, dashboards)?;
            output::history(&dash.history().await?);
        }
    }
    Ok(())
}

/// `--once` fetches a single manual round; otherwise the dashboard's own
/// cadence applies. `None` means fetch on entry only.
fn schedule(once: bool, interval: Option<Duration>) -> Schedule {
    match (once, interval) {
        (true, _) => Schedule::Manual,
        (false, Some(interval)) => Schedule::Every(interval),
        (false, None) => Schedule::OnEntry,
    }
}

/// Print on every cache change until Ctrl-C, or once after a manual round.
async fn follow(view: &LiveView, once: bool, render: impl Fn()) {
    if once {
        let report = view.refresh().await;
        if let Err(e) = report.check() {
            warn!(error = %e, "Dashboard loaded incompletely");
        }
        render();
        view.cancel();
        return;
    }

    let mut changes = view.subscribe();
    // Render whatever arrived before the subscription
    changes.mark_changed();
    render_until(changes, tokio::signal::ctrl_c(), render).await;
    view.cancel();
}

/// Render on every change until `stop` resolves or the sender goes away.
async fn render_until<T, S>(mut changes: watch::Receiver<T>, stop: S, render: impl Fn())
where
    S: Future,
{
    tokio::pin!(stop);
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                render();
            }
            _ = &mut stop => {
                info!("Interrupted");
                break;
            }
        }
    }
}
