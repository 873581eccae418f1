use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;

use crate::aws::CredentialStore;
use crate::constants;
use crate::shell::{self, ShellFlavor};

#[derive(Debug, Clone, Args)]
pub struct EnvCommand {
    #[arg(long, value_enum, help = "Syntax of the printed exports [default: platform]")]
    pub shell: Option<ShellFlavor>,
}

impl EnvCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        let path = constants::get_aws_credentials_path()
            .context("Failed to determine AWS credentials path")?;
        let credentials = CredentialStore::new(path)
            .load(profile)
            .await
            .with_context(|| format!("Failed to load credentials for profile '{profile}'"))?;

        if credentials.expiration <= Utc::now() {
            bail!("Credentials for profile '{profile}' have expired. Run `samlsts auth -p {profile}`");
        }

        print!(
            "{}",
            shell::format_exports(&credentials, self.shell.unwrap_or_default())
        );
        Ok(())
    }
}
