use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::Args;

use crate::aws::{CredentialStore, StoredProfile, credentials::format_expiration};
use crate::constants;

#[derive(Debug, Clone, Args)]
pub struct ListCommand {}

impl ListCommand {
    pub async fn execute(self) -> Result<()> {
        let path = constants::get_aws_credentials_path()
            .context("Failed to determine AWS credentials path")?;
        let profiles = CredentialStore::new(path)
            .list_valid()
            .await
            .context("Failed to read AWS credentials file")?;

        print!("{}", render(&profiles));
        Ok(())
    }
}

fn render(profiles: &[StoredProfile]) -> String {
    if profiles.is_empty() {
        return "No valid profiles.\n".to_string();
    }

    let width = profiles.iter().map(|p| p.name.len()).max().unwrap_or(0);
    profiles
        .iter()
        .map(|p| {
            format!(
                "{:width$}  expires {}  ({} remaining)\n",
                p.name,
                format_expiration(&p.expires_at),
                format_remaining(p.remaining),
            )
        })
        .collect()
}

fn format_remaining(remaining: TimeDelta) -> String {
    let minutes = remaining.num_minutes();
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h{m:02}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::Credentials;
    use chrono::{TimeZone, Utc};

    fn profile(name: &str, remaining: TimeDelta) -> StoredProfile {
        let expires_at = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        StoredProfile {
            name: name.to_string(),
            credentials: Credentials {
                access_key_id: "ASIA".to_string(),
                secret_access_key: "s".to_string(),
                session_token: "t".to_string(),
                expiration: expires_at,
            },
            expires_at,
            remaining,
        }
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(TimeDelta::minutes(42)), "42m");
        assert_eq!(format_remaining(TimeDelta::minutes(125)), "2h05m");
        assert_eq!(format_remaining(TimeDelta::seconds(30)), "0m");
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&[]), "No valid profiles.\n");

        let out = render(&[
            profile("dev", TimeDelta::minutes(90)),
            profile("production", TimeDelta::minutes(5)),
        ]);
        assert_eq!(
            out,
            "dev         expires 2030-01-01T12:00:00Z  (1h30m remaining)\n\
             production  expires 2030-01-01T12:00:00Z  (5m remaining)\n"
        );
    }
}
