use dialoguer::{Input, Password, Select, theme::ColorfulTheme};
use std::io;

use crate::aws::IamRole;
use crate::idp::MfaFactor;

/// User-facing decisions the acquisition pipeline needs.
///
/// Selections return an index into the given slice; callers re-ask when the
/// index is out of range.
pub trait Interaction: Send + Sync {
    fn read_password(&self, username: &str) -> io::Result<String>;

    fn select_factor(&self, factors: &[MfaFactor]) -> io::Result<usize>;

    fn read_otp(&self, factor: &MfaFactor) -> io::Result<String>;

    fn select_role(&self, roles: &[IamRole]) -> io::Result<usize>;
}

/// Interactive prompts on the controlling terminal
#[derive(Default)]
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl Interaction for TerminalPrompt {
    fn read_password(&self, username: &str) -> io::Result<String> {
        Password::with_theme(&self.theme)
            .with_prompt(format!("Password for {username}"))
            .interact()
            .map_err(io::Error::other)
    }

    fn select_factor(&self, factors: &[MfaFactor]) -> io::Result<usize> {
        let items: Vec<String> = factors.iter().map(ToString::to_string).collect();
        Select::with_theme(&self.theme)
            .with_prompt("Select an MFA factor")
            .items(&items)
            .default(0)
            .interact()
            .map_err(io::Error::other)
    }

    fn read_otp(&self, factor: &MfaFactor) -> io::Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(format!("Verification code ({factor})"))
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("Verification code is required")
                } else {
                    Ok(())
                }
            })
            .interact_text()
            .map(|code| code.trim().to_string())
            .map_err(io::Error::other)
    }

    fn select_role(&self, roles: &[IamRole]) -> io::Result<usize> {
        let items: Vec<&str> = roles.iter().map(|r| r.role_arn.as_str()).collect();
        Select::with_theme(&self.theme)
            .with_prompt("Select a role to assume")
            .items(&items)
            .default(0)
            .interact()
            .map_err(io::Error::other)
    }
}
