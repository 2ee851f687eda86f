//! Posting and history commands.
//!
//! # Usage
//!
//! ```bash
//! mw analyze -m "เหนื่อยมาก" -i ./photo.jpg
//! mw simulate --count 3
//! mw history P-001
//! ```

use std::path::Path;

use mindwatch_console::ConsoleError;
use mindwatch_console::dashboards::{AdminDashboard, PatientDashboard};
use mindwatch_console::feed::{Analyzer, PostFeed, load_image};
use mindwatch_console::sync::Schedule;
use mindwatch_core::Role;
use tracing::info;

use super::{CommandError, Context, parse_user_id};
use crate::output;

/// Analyse content as the logged-in user.
///
/// Patients post to their feed; admins use the overview analyzer, which
/// takes text only.
pub async fn analyze(
    ctx: &Context,
    message: Option<&str>,
    image: Option<&Path>,
) -> Result<(), CommandError> {
    let message = message.unwrap_or_default();
    if message.trim().is_empty() && image.is_none() {
        return Err(CommandError::NothingToAnalyze);
    }

    let role = ctx
        .auth()
        .current()?
        .map(|session| session.role())
        .ok_or(ConsoleError::AuthRequired)?;

    match role {
        Role::Patient => {
            let dash = PatientDashboard::open(ctx.gate(role)?, &ctx.dashboards)?;
            let image = match image {
                Some(path) => Some(load_image(path).await?),
                None => None,
            };
            let id = dash.submit(message, image).await?;
            if let Some(post) = dash.posts().iter().find(|p| p.id == id) {
                output::post(post);
            }
        }
        Role::Admin if image.is_none() => {
            let dash = AdminDashboard::open_with_schedule(
                ctx.gate(role)?,
                &ctx.dashboards,
                Schedule::Manual,
            )?;
            let result = dash.analyze(message).await;
            dash.close();
            output::analysis(&result?);
        }
        other => return Err(CommandError::CannotAnalyze(other)),
    }
    Ok(())
}

/// Post `count` sample messages to the patient feed, then print the feed.
pub async fn simulate(ctx: &Context, count: usize) -> Result<(), CommandError> {
    let dash = PatientDashboard::open(ctx.gate(Role::Patient)?, &ctx.dashboards)?;
    let handle = dash.simulate(Some(count));
    info!(count, "Simulating posts");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => handle.cancel(),
        () = settled(dash.feed(), count) => {}
    }
    let posted = handle.join().await;

    for post in dash.posts().iter().rev() {
        output::post(post);
    }
    info!(posted, "Simulation finished");
    Ok(())
}

/// Wait until `count` posts exist and none is still being analysed.
async fn settled<A: Analyzer>(feed: &PostFeed<A>, count: usize) {
    let mut posts = feed.subscribe();
    let _ = posts
        .wait_for(|posts| posts.len() >= count && posts.iter().all(|p| !p.analyzing))
        .await;
}

/// Print a user's analysis history, authenticated when a session exists.
pub async fn history(ctx: &Context, user: &str) -> Result<(), CommandError> {
    let user_id = parse_user_id(user)?;
    let session = ctx.auth().current()?;
    let entries = ctx
        .dashboards
        .api
        .history(&user_id, session.as_ref())
        .await?;
    output::history(&entries);
    Ok(())
}
