use std::{env, path::PathBuf, time::Duration};

use dirs;

/// Configuration directory name under `~/.config`
pub const CONFIG_DIR_NAME: &str = "samlsts";

/// Configuration file name inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config";

/// Overrides the configuration file location
pub const CONFIG_FILE_ENV: &str = "SAMLSTS_CONFIG_FILE";

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// SAML attribute carrying `role-arn,provider-arn` pairs
pub const AWS_ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";

/// Re-prompts allowed for an out-of-range role or factor selection
pub const MAX_SELECTION_ATTEMPTS: usize = 5;

/// Session duration when neither provider nor app configures one
pub const DEFAULT_SESSION_DURATION_SECS: i32 = 3600;

/// Duration retried once when STS rejects the requested one
pub const FALLBACK_SESSION_DURATION_SECS: i32 = 3600;

/// STS lower bound for `DurationSeconds`
pub const MIN_SESSION_DURATION_SECS: i32 = 900;

/// STS upper bound for `DurationSeconds`
pub const MAX_SESSION_DURATION_SECS: i32 = 43200;

pub const PUSH_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Request timeout for every IdP HTTP call
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default AWS region for STS operations when no region is configured
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Keychain service name for stored IdP passwords
pub const KEYRING_SERVICE: &str = "samlsts";

fn home_dir() -> Option<PathBuf> {
    dirs::home_dir().or_else(|| {
        env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from)
    })
}

/// Get the configuration file path
/// Respects SAMLSTS_CONFIG_FILE environment variable if set
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    // Always ~/.config, regardless of platform
    home_dir().map(|home| {
        home.join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    })
}

/// Get the AWS credentials file path
/// Respects AWS_SHARED_CREDENTIALS_FILE environment variable if set
pub fn get_aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME).join(AWS_CREDENTIALS_FILE_NAME))
}
