use anyhow::{Context, Result};
use clap::Args;

use crate::config::{self, Config};

#[derive(Debug, Clone, Args)]
pub struct ConfigureCommand {
    #[arg(long, help = "Print the current settings instead of prompting")]
    pub show: bool,
}

impl ConfigureCommand {
    pub async fn execute(self, profile: &str) -> Result<()> {
        if self.show {
            let config = config::load(profile)
                .await
                .with_context(|| format!("Failed to load configuration for profile '{profile}'"))?;
            print!("{}", describe(&config));
            return Ok(());
        }
        config::configure_interactive(profile).await
    }
}

fn describe(config: &Config) -> String {
    let provider = &config.provider;
    let profile = &config.profile;
    let unset = || "-".to_string();

    let mut lines = vec![
        format!("profile           {}", profile.name),
        format!("provider          {} ({})", provider.name, provider.kind),
        format!("base_url          {}", provider.base_url),
        format!("username          {}", provider.username),
        format!("app               {}", profile.app),
        format!("role              {}", profile.role.clone().unwrap_or_else(unset)),
        format!("mfa_factor        {}", provider.mfa_factor.clone().unwrap_or_else(unset)),
        format!("session_duration  {}s", config.session_duration()),
        format!("region            {}", profile.region.clone().unwrap_or_else(unset)),
        format!("use_keychain      {}", provider.use_keychain),
    ];
    if let Some(subdomain) = &provider.subdomain {
        lines.push(format!("subdomain         {subdomain}"));
    }
    if provider.client_secret.is_some() {
        lines.push("client_secret     ********".to_string());
    }

    lines.into_iter().map(|line| line + "\n").collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProfileConfig, ProviderConfig, ProviderKind};

    #[test]
    fn test_describe_masks_secret() {
        let config = Config {
            provider: ProviderConfig {
                name: "ol".to_string(),
                kind: ProviderKind::OneLogin,
                base_url: "https://api.us.onelogin.com".to_string(),
                username: "bob".to_string(),
                mfa_factor: None,
                session_duration: Some(43200),
                use_keychain: false,
                client_id: Some("id".to_string()),
                client_secret: Some("very-secret".to_string()),
                subdomain: Some("acme".to_string()),
            },
            profile: ProfileConfig {
                name: "prod".to_string(),
                provider: "ol".to_string(),
                app: "123456".to_string(),
                role: None,
                session_duration: Some(7200),
                region: None,
            },
        };

        let out = describe(&config);
        assert!(out.contains("provider          ol (onelogin)"));
        assert!(out.contains("session_duration  7200s"));
        assert!(out.contains("role              -"));
        assert!(out.contains("subdomain         acme"));
        assert!(!out.contains("very-secret"));
    }
}
