use clap::ValueEnum;

use crate::aws::Credentials;
use crate::aws::credentials::format_expiration;

/// Syntax of the printed environment assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellFlavor {
    /// `export KEY=value`
    Posix,
    /// `set KEY=value`
    Windows,
}

impl Default for ShellFlavor {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// Environment assignments for `credentials`, one per line
pub fn format_exports(credentials: &Credentials, flavor: ShellFlavor) -> String {
    let keyword = match flavor {
        ShellFlavor::Posix => "export",
        ShellFlavor::Windows => "set",
    };
    let expiration = format_expiration(&credentials.expiration);

    [
        ("AWS_ACCESS_KEY_ID", credentials.access_key_id.as_str()),
        ("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key.as_str()),
        ("AWS_SESSION_TOKEN", credentials.session_token.as_str()),
        ("AWS_CREDENTIAL_EXPIRATION", expiration.as_str()),
    ]
    .iter()
    .map(|(key, value)| format!("{keyword} {key}={value}\n"))
    .collect()
}
