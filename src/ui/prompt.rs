//! Interactive prompts.
//!
//! Passwords are collected without echo and land directly in a
//! [`Password`] buffer; confirmations guard destructive operations.

use anyhow::{Context, Result};
use inquire::validator::Validation;
use inquire::{Confirm, PasswordDisplayMode};

use crate::config::PASSWORD_MIN_LENGTH;
use crate::secret::Password;

/// Prompts for a new password with confirmation and a minimum-length
/// policy. Used at vault initialization and rotation.
pub fn prompt_new_password(label: &str) -> Result<Password> {
    let raw = inquire::Password::new(label)
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_validator(|input: &str| {
            if input.len() < PASSWORD_MIN_LENGTH {
                Ok(Validation::Invalid(
                    format!("password must be at least {PASSWORD_MIN_LENGTH} characters").into(),
                ))
            } else {
                Ok(Validation::Valid)
            }
        })
        .with_custom_confirmation_message("Confirm password:")
        .with_custom_confirmation_error_message("The passwords do not match.")
        .prompt()
        .context("password prompt failed")?;

    Ok(Password::from_string(raw))
}

/// Prompts for an existing password, no confirmation.
pub fn prompt_password(label: &str) -> Result<Password> {
    let raw = inquire::Password::new(label)
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("password prompt failed")?;

    Ok(Password::from_string(raw))
}

/// Yes/no confirmation, defaulting to no.
pub fn confirm(message: &str) -> Result<bool> {
    Confirm::new(message)
        .with_default(false)
        .prompt()
        .context("confirmation prompt failed")
}
