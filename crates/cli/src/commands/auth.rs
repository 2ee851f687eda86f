//! Session commands: login, logout, whoami and registration.
//!
//! # Usage
//!
//! ```bash
//! mw login -u P-001 -p secret
//! mw register -u P-002 -n "Somchai" --age 29 --login
//! mw whoami
//! mw logout
//! ```
//!
//! # Environment Variables
//!
//! - `MINDWATCH_PASSWORD` - Password when `-p` is not given

use mindwatch_console::api::Registration;
use mindwatch_core::resolve_role;
use secrecy::SecretString;

use super::{Account, CommandError, Context, parse_user_id};
use crate::output;

/// Log in and print the dashboard route for the user's role.
pub async fn login(ctx: &Context, user: &str, password: String) -> Result<(), CommandError> {
    let user_id = parse_user_id(user)?;
    let password = SecretString::from(password);
    let route = ctx.auth().login(&user_id, &password).await?;
    output::route(resolve_role(user_id.as_str()), route);
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<(), CommandError> {
    ctx.auth().logout()?;
    output::line("Logged out");
    Ok(())
}

pub fn whoami(ctx: &Context) -> Result<(), CommandError> {
    match ctx.auth().current()? {
        Some(session) => output::whoami(&session),
        None => output::line("Not logged in"),
    }
    Ok(())
}

/// Register an account, optionally logging in afterwards.
pub async fn register(
    ctx: &Context,
    account: Account,
    password: String,
    login: bool,
) -> Result<(), CommandError> {
    let registration = Registration {
        user_id: parse_user_id(&account.user_id)?,
        password: SecretString::from(password),
        profile: account.profile,
    };

    let auth = ctx.auth();
    if login {
        let route = auth.register_and_login(&registration).await?;
        output::route(resolve_role(registration.user_id.as_str()), route);
    } else {
        auth.register(&registration).await?;
        output::line("Registered");
    }
    Ok(())
}
