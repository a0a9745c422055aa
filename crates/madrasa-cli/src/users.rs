use std::io::IsTerminal;

use anyhow::{Context, Result, bail};
use dialoguer::Password;
use madrasa_common::Role;
use madrasa_db::{Database, NewUser, UserRecord};
use madrasa_security::{InputValidator, hash_password};
use tracing::info;

/// Account fields collected from the command line.
#[derive(Debug, Clone)]
pub struct AddUser {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Create an account. Without `--password`, prompt for one on a terminal.
pub fn add_user(db: &Database, mut args: AddUser) -> Result<UserRecord> {
    let password = match args.password.take() {
        Some(password) => password,
        None => prompt_password()?,
    };
    create_account(db, args, &password)
}

fn prompt_password() -> Result<String> {
    if !std::io::stdin().is_terminal() {
        bail!("no --password given and stdin is not a terminal");
    }
    Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords don't match")
        .interact()
        .context("password input cancelled")
}

fn create_account(db: &Database, args: AddUser, password: &str) -> Result<UserRecord> {
    if password.len() < 8 {
        bail!("password must be at least 8 characters");
    }
    let first_name = InputValidator::sanitize_line(&args.first_name);
    if first_name.is_empty() {
        bail!("first name is required");
    }
    let phone_number = InputValidator::normalize_phone_number(&args.phone)?;

    let user = db
        .create_user(&NewUser {
            first_name,
            last_name: InputValidator::sanitize_line(&args.last_name),
            phone_number,
            email: args.email.filter(|e| !e.trim().is_empty()),
            password_hash: hash_password(password)?,
            role: args.role,
        })
        .context("failed to create user")?;

    info!(user_id = user.id, role = %user.role, "user created");
    Ok(user)
}
