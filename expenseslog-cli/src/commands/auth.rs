//! Auth commands - login, signup, logout, whoami

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Password};
use expenseslog_core::domain::SignupForm;
use expenseslog_core::services::LoggingService;
use expenseslog_core::User;

use super::{get_context, require_session};
use crate::output;

/// How the user proves who they are
pub enum LoginMethod {
    Password {
        email: Option<String>,
        password: Option<String>,
    },
    Google(String),
    Token(String),
}

fn prompt_email(email: Option<String>) -> Result<String> {
    match email {
        Some(e) => Ok(e),
        None => Ok(Input::<String>::new().with_prompt("Email").interact_text()?),
    }
}

fn prompt_password(password: Option<String>, prompt: &str) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => Ok(Password::new().with_prompt(prompt).interact()?),
    }
}

fn print_user(user: &User, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
    } else {
        println!("{} {} <{}>", "Signed in as".green(), user.name.bold(), user.email);
    }
    Ok(())
}

pub async fn login(method: LoginMethod, logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;

    let user = match method {
        LoginMethod::Password { email, password } => {
            let email = prompt_email(email)?;
            let password = prompt_password(password, "Password")?;
            let bar = output::spinner("Signing in...");
            let result = ctx.session.login_with_password(&email, &password).await;
            bar.finish_and_clear();
            result?
        }
        LoginMethod::Google(id_token) => {
            let bar = output::spinner("Signing in with Google...");
            let result = ctx.session.login_with_google(&id_token).await;
            bar.finish_and_clear();
            result?
        }
        LoginMethod::Token(token) => {
            let bar = output::spinner("Validating token...");
            let result = ctx.session.login(&token).await;
            bar.finish_and_clear();
            result?
        }
    };

    print_user(&user, false)
}

pub async fn signup(
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    logger: Option<Arc<LoggingService>>,
) -> Result<()> {
    let ctx = get_context(logger)?;

    let name = match name {
        Some(n) => n,
        None => Input::<String>::new().with_prompt("Name").interact_text()?,
    };
    let email = prompt_email(email)?;
    let (password, confirm_password) = match password {
        // A password passed on the command line is its own confirmation
        Some(p) => (p.clone(), p),
        None => (
            prompt_password(None, "Password")?,
            prompt_password(None, "Confirm password")?,
        ),
    };

    let form = SignupForm {
        name,
        email,
        password,
        confirm_password,
    };

    let bar = output::spinner("Creating account...");
    let result = ctx.session.signup(&form).await;
    bar.finish_and_clear();

    print_user(&result?, false)
}

pub fn logout(logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    ctx.session.logout();
    output::success("Logged out.");
    Ok(())
}

pub async fn whoami(json: bool, logger: Option<Arc<LoggingService>>) -> Result<()> {
    let ctx = get_context(logger)?;
    let user = require_session(&ctx).await?;
    print_user(&user, json)
}
