use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::{
    acquire::{AcquireRequest, Acquisition, PersistTarget},
    aws::{CredentialStore, StsRoleAssumer, credentials::format_expiration},
    config,
    constants,
    mfa::MfaVerifier,
    prompt::TerminalPrompt,
    secrets::{KeyringSecretStore, SecretStore},
    shell::{self, ShellFlavor},
};

#[derive(Debug, Clone, Default, Args)]
pub struct AuthCommand {
    #[arg(short = 'r', long, help = "AWS IAM role name or ARN to assume")]
    pub role: Option<String>,

    #[arg(
        short = 'd',
        long,
        value_parser = clap::value_parser!(i32).range(900..=43200),
        help = "Session duration in seconds (overrides configuration)"
    )]
    pub duration: Option<i32>,

    #[arg(long, help = "Print shell exports instead of saving to the credentials file")]
    pub env: bool,

    #[arg(long, value_enum, help = "Syntax of the printed exports [default: platform]")]
    pub shell: Option<ShellFlavor>,
}

impl AuthCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        info!("Starting authentication for profile: {}", profile);

        let config = config::load(profile).await.with_context(|| {
            format!("Failed to load configuration for profile '{profile}'. Please run 'samlsts configure' first.")
        })?;

        let provider = config::build_provider(&config.provider, &config.profile.app)?;
        let assumer = StsRoleAssumer::new(config.profile.region.as_deref()).await;
        let interaction = TerminalPrompt::default();
        let keyring = KeyringSecretStore::default();
        let secrets = config
            .provider
            .use_keychain
            .then_some(&keyring as &dyn SecretStore);

        let store = match self.env {
            true => None,
            false => Some(CredentialStore::new(
                constants::get_aws_credentials_path()
                    .context("Failed to determine AWS credentials path")?,
            )),
        };

        let secret_key = config.provider.secret_key();
        let role = self.role.as_deref().or(config.profile.role.as_deref());
        let request = AcquireRequest {
            username: &config.provider.username,
            app: &config.profile.app,
            role,
            duration_seconds: self.duration.unwrap_or_else(|| config.session_duration()),
            secret_key: Some(&secret_key),
            persist: store.as_ref().map(|store| PersistTarget { store, profile }),
        };

        let acquisition = Acquisition {
            provider: &provider,
            assumer: &assumer,
            interaction: &interaction,
            secrets,
            mfa: MfaVerifier::default().with_preferred_factor(config.provider.mfa_factor.clone()),
        };

        let acquired = acquisition
            .run(&request)
            .await
            .context("Failed to acquire AWS credentials")?;
        let credentials = &acquired.assumed.credentials;

        if acquired.assumed.reduced {
            eprintln!(
                "Warning: session duration reduced to {}s. Raise MaxSessionDuration on {} to allow {}s.",
                acquired.assumed.duration_seconds, acquired.role.role_arn, request.duration_seconds
            );
        }

        if self.env {
            print!(
                "{}",
                shell::format_exports(credentials, self.shell.unwrap_or_default())
            );
            return Ok(());
        }

        println!("\nAWS credentials saved to {profile} profile.");
        println!(
            "Credentials will expire at: {}",
            format_expiration(&credentials.expiration)
        );
        if let Some(report) = acquired.report.filter(|r| !r.pruned.is_empty()) {
            println!("Removed expired profiles: {}", report.pruned.join(", "));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> AuthCommand {
        match Cli::try_parse_from(args).unwrap().command {
            Some(Commands::Auth(cmd)) => cmd,
            other => panic!("Expected Auth command, got {other:?}"),
        }
    }

    #[test]
    fn test_duration_and_env_flags() {
        let cmd = parse(&["samlsts", "auth", "-d", "7200", "--env", "--shell", "windows"]);
        assert_eq!(cmd.duration, Some(7200));
        assert!(cmd.env);
        assert_eq!(cmd.shell, Some(ShellFlavor::Windows));
    }

    #[test]
    fn test_duration_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["samlsts", "auth", "--duration", "60"]).is_err());
        assert!(Cli::try_parse_from(["samlsts", "auth", "--duration", "50000"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cmd = parse(&["samlsts", "auth"]);
        assert_eq!(cmd.role, None);
        assert_eq!(cmd.duration, None);
        assert!(!cmd.env);
        assert_eq!(cmd.shell, None);
    }
}
