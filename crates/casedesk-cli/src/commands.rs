//! Command handlers. Each takes the already-built session store.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use casedesk_core::auth::{LoginOutcome, SessionError, SessionStore};
use casedesk_core::config::Config;
use casedesk_core::models::Identity;
use serde_json::json;
use tracing::warn;

const ENV_PASSWORD: &str = "CASEDESK_PASSWORD";

pub async fn login(
    session: &mut SessionStore,
    config: &mut Config,
    email: Option<String>,
) -> Result<ExitCode> {
    if let Some(user) = session.user() {
        println!(
            "Already signed in as {}. Run `casedesk logout` first to switch accounts.",
            user.display_name()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    match session.login(&email, &password).await {
        LoginOutcome::Success => {
            config.last_email = Some(email.trim().to_string());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            let name = session.user().map(|u| u.display_name()).unwrap_or_default();
            println!("Signed in as {}", name);
            Ok(ExitCode::SUCCESS)
        }
        LoginOutcome::Failed { message } => {
            eprintln!("Login failed: {}", message);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match last {
        Some(last) if input.is_empty() => last.to_string(),
        _ => input.to_string(),
    })
}

pub async fn logout(session: &mut SessionStore) -> ExitCode {
    session.logout().await;
    println!("Signed out");
    ExitCode::SUCCESS
}

/// One line per active membership, admins flagged; inactive ones are only counted.
fn membership_lines(identity: &Identity) -> Vec<String> {
    let mut lines: Vec<String> = identity
        .active_memberships()
        .map(|m| {
            let admin = if m.role.is_admin() { " [admin]" } else { "" };
            format!("  {} - {}{}", m.scope_display(), m.role_label(), admin)
        })
        .collect();
    if lines.is_empty() {
        lines.push("No active memberships".to_string());
    }

    let inactive = identity.memberships.len() - identity.active_memberships().count();
    if inactive > 0 {
        lines.push(format!("  ({} inactive not shown)", inactive));
    }
    lines
}

pub fn whoami(session: &SessionStore, as_json: bool) -> Result<ExitCode> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
        return Ok(exit_for(session));
    }

    let Some(identity) = session.identity() else {
        eprintln!("Not signed in. Run `casedesk login`.");
        return Ok(ExitCode::FAILURE);
    };

    let user = &identity.user;
    println!("{} <{}>", user.display_name(), user.email);
    for line in membership_lines(identity) {
        println!("{}", line);
    }
    Ok(ExitCode::SUCCESS)
}

pub fn status(session: &SessionStore, config: &Config, as_json: bool) -> Result<ExitCode> {
    let tokens = session.stored_tokens();
    let issued = tokens.as_ref().map(|t| t.age_display());

    if as_json {
        let value = json!({
            "session": session.snapshot(),
            "base_url": config.base_url,
            "token_store": config.token_store.to_string(),
            "tokens_issued": issued,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(exit_for(session));
    }

    println!("API:         {}", config.base_url);
    println!("Token store: {}", config.token_store);
    match session.user() {
        Some(user) => println!("Session:     signed in as {}", user.display_name()),
        None => println!("Session:     signed out"),
    }
    if let Some(issued) = issued {
        println!("Tokens:      issued {}", issued);
    }
    Ok(exit_for(session))
}

pub async fn refresh(session: &mut SessionStore) -> ExitCode {
    match session.refresh().await {
        Ok(()) => {
            println!("Access token refreshed");
            ExitCode::SUCCESS
        }
        Err(SessionError::NotAuthenticated) => {
            eprintln!("Not signed in. Run `casedesk login`.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Refresh failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn exit_for(session: &SessionStore) -> ExitCode {
    if session.is_authenticated() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_with(memberships: serde_json::Value) -> Identity {
        serde_json::from_value(json!({
            "user": {"id": 1, "email": "ana@example.com"},
            "memberships": memberships,
        }))
        .unwrap()
    }

    #[test]
    fn test_membership_lines_flag_admins_and_skip_inactive() {
        let identity = identity_with(json!([
            {"id": 1, "organization": 1, "organization_name": "Silva", "role": "org_admin"},
            {"id": 2, "organization": 1, "organization_name": "Silva", "office_name": "Centro",
             "role": "lawyer", "role_display": "Lawyer"},
            {"id": 3, "organization": 2, "organization_name": "Old", "role": "intern", "is_active": false},
        ]));

        assert_eq!(
            membership_lines(&identity),
            vec![
                "  Silva (all offices) - org_admin [admin]",
                "  Silva / Centro - Lawyer",
                "  (1 inactive not shown)",
            ]
        );
    }

    #[test]
    fn test_membership_lines_without_memberships() {
        let identity = identity_with(json!([]));
        assert_eq!(membership_lines(&identity), vec!["No active memberships"]);
    }
}
