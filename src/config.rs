use anyhow::{Context, Result, bail};
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};
use ini::{Ini, Properties};
use reqwest::Client;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

use crate::aws::sts::effective_duration;
use crate::constants::{self, HTTP_TIMEOUT, MAX_SESSION_DURATION_SECS, MIN_SESSION_DURATION_SECS};
use crate::idp::Provider;
use crate::idp::okta::OktaProvider;
use crate::idp::onelogin::{OneLoginProvider, OneLoginSettings};
use crate::ini_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Okta,
    OneLogin,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Okta => "okta",
            Self::OneLogin => "onelogin",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "okta" => Ok(Self::Okta),
            "onelogin" => Ok(Self::OneLogin),
            other => bail!("Unknown provider type '{other}' (expected okta or onelogin)"),
        }
    }
}

/// `[provider <name>]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub username: String,
    pub mfa_factor: Option<String>,
    pub session_duration: Option<i32>,
    pub use_keychain: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub subdomain: Option<String>,
}

/// `[profile <name>]` or `[default]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub name: String,
    pub provider: String,
    pub app: String,
    pub role: Option<String>,
    pub session_duration: Option<i32>,
    pub region: Option<String>,
}

/// A profile together with the provider it authenticates through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub profile: ProfileConfig,
    pub provider: ProviderConfig,
}

impl Config {
    /// Provider and app durations combined, the smaller one winning
    pub fn session_duration(&self) -> i32 {
        effective_duration(self.provider.session_duration, self.profile.session_duration)
    }
}

fn profile_section(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

fn provider_section(name: &str) -> String {
    format!("provider {name}")
}

fn required(section: &Properties, section_name: &str, key: &str) -> Result<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .with_context(|| format!("[{section_name}] is missing required key '{key}'"))
}

fn optional(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn duration(section: &Properties, section_name: &str) -> Result<Option<i32>> {
    let Some(value) = optional(section, "session_duration") else {
        return Ok(None);
    };
    let seconds: i32 = value.parse().with_context(|| {
        format!("[{section_name}] session_duration '{value}' is not a number of seconds")
    })?;
    validate_duration(seconds)
        .with_context(|| format!("[{section_name}] has an invalid session_duration"))?;
    Ok(Some(seconds))
}

/// Durations accepted by STS
pub fn validate_duration(seconds: i32) -> Result<()> {
    if (MIN_SESSION_DURATION_SECS..=MAX_SESSION_DURATION_SECS).contains(&seconds) {
        Ok(())
    } else {
        bail!(
            "Session duration must be between {MIN_SESSION_DURATION_SECS} and {MAX_SESSION_DURATION_SECS} seconds, got {seconds}"
        )
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

impl ProviderConfig {
    fn from_ini_section(name: &str, section: &Properties) -> Result<Self> {
        let section_name = provider_section(name);
        let kind: ProviderKind = required(section, &section_name, "type")?.parse()?;

        let use_keychain = match optional(section, "use_keychain") {
            Some(value) => parse_bool(&value).with_context(|| {
                format!("[{section_name}] use_keychain '{value}' is not a boolean")
            })?,
            None => true,
        };

        let config = Self {
            name: name.to_string(),
            kind,
            base_url: required(section, &section_name, "base_url")?,
            username: required(section, &section_name, "username")?,
            mfa_factor: optional(section, "mfa_factor"),
            session_duration: duration(section, &section_name)?,
            use_keychain,
            client_id: optional(section, "client_id"),
            client_secret: optional(section, "client_secret"),
            subdomain: optional(section, "subdomain"),
        };

        if kind == ProviderKind::OneLogin {
            for (key, value) in [
                ("client_id", &config.client_id),
                ("client_secret", &config.client_secret),
                ("subdomain", &config.subdomain),
            ] {
                if value.is_none() {
                    bail!("[{section_name}] is missing required key '{key}' for onelogin");
                }
            }
        }

        Ok(config)
    }

    fn save_to_ini(&self, ini: &mut Ini) {
        let mut setter = ini.with_section(Some(provider_section(&self.name)));
        setter
            .set("type", self.kind.as_str())
            .set("base_url", &self.base_url)
            .set("username", &self.username)
            .set("use_keychain", self.use_keychain.to_string());
        if let Some(factor) = &self.mfa_factor {
            setter.set("mfa_factor", factor);
        }
        if let Some(seconds) = self.session_duration {
            setter.set("session_duration", seconds.to_string());
        }
        for (key, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("subdomain", &self.subdomain),
        ] {
            if let Some(value) = value {
                setter.set(key, value);
            }
        }
    }

    /// Keychain account for this provider login
    pub fn secret_key(&self) -> String {
        crate::secrets::secret_key(&self.name, &self.username)
    }
}

impl ProfileConfig {
    fn from_ini_section(name: &str, section: &Properties) -> Result<Self> {
        let section_name = profile_section(name);
        Ok(Self {
            name: name.to_string(),
            provider: required(section, &section_name, "provider")?,
            app: required(section, &section_name, "app")?,
            role: optional(section, "role"),
            session_duration: duration(section, &section_name)?,
            region: optional(section, "region"),
        })
    }

    fn save_to_ini(&self, ini: &mut Ini) {
        let mut setter = ini.with_section(Some(profile_section(&self.name)));
        setter
            .set("provider", &self.provider)
            .set("app", &self.app);
        if let Some(role) = &self.role {
            setter.set("role", role);
        }
        if let Some(seconds) = self.session_duration {
            setter.set("session_duration", seconds.to_string());
        }
        if let Some(region) = &self.region {
            setter.set("region", region);
        }
    }
}

fn from_ini(ini: &Ini, profile: &str) -> Result<Config> {
    let section = ini
        .section(Some(profile_section(profile)))
        .with_context(|| format!("Profile '{profile}' not found in config"))?;
    let profile = ProfileConfig::from_ini_section(profile, section)?;

    let section = ini
        .section(Some(provider_section(&profile.provider)))
        .with_context(|| {
            format!(
                "Provider '{}' referenced by profile '{}' not found in config",
                profile.provider, profile.name
            )
        })?;
    let provider = ProviderConfig::from_ini_section(&profile.provider, section)?;

    Ok(Config { profile, provider })
}

pub async fn load(profile: &str) -> Result<Config> {
    load_from(&get_config_path()?, profile).await
}

pub async fn load_from(path: &Path, profile: &str) -> Result<Config> {
    let content = fs::read_to_string(path).await.with_context(|| {
        format!(
            "Failed to load config file {}. Please run `samlsts configure` first",
            path.display()
        )
    })?;
    let ini = ini_file::parse(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    from_ini(&ini, profile)
}

pub async fn save(config: &Config) -> Result<()> {
    save_to(&get_config_path()?, config).await
}

pub async fn save_to(path: &Path, config: &Config) -> Result<()> {
    let mut ini = match fs::read_to_string(path).await {
        Ok(content) => ini_file::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?,
        Err(e) if e.kind() == ErrorKind::NotFound => Ini::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file {}", path.display()));
        }
    };

    ini.delete(Some(profile_section(&config.profile.name)));
    ini.delete(Some(provider_section(&config.provider.name)));
    config.provider.save_to_ini(&mut ini);
    config.profile.save_to_ini(&mut ini);

    // may hold the OneLogin client secret
    let buffer = ini_file::render(&ini).context("Failed to serialize config")?;
    ini_file::write_private(path, &buffer)
        .await
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Identity provider client for `config`, acting on behalf of `app`
pub fn build_provider(config: &ProviderConfig, app: &str) -> Result<Provider> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let provider = match config.kind {
        ProviderKind::Okta => Provider::Okta(OktaProvider::new(client, &config.base_url)),
        ProviderKind::OneLogin => {
            let missing = |key: &str| format!("Provider '{}' is missing {key}", config.name);
            let settings = OneLoginSettings {
                base_url: config.base_url.clone(),
                client_id: config.client_id.clone().with_context(|| missing("client_id"))?,
                client_secret: config
                    .client_secret
                    .clone()
                    .with_context(|| missing("client_secret"))?,
                subdomain: config.subdomain.clone().with_context(|| missing("subdomain"))?,
                app_id: app.to_string(),
            };
            Provider::OneLogin(OneLoginProvider::new(client, settings))
        }
    };
    Ok(provider)
}

pub async fn configure_interactive(profile: &str) -> Result<()> {
    println!("Configuring samlsts for profile: {profile}");

    let existing = load(profile).await.ok();
    if existing.is_some() {
        println!("Press Enter to keep current values, or type new values.");
    }
    println!();

    let theme = ColorfulTheme::default();

    let provider_name = Input::<String>::with_theme(&theme)
        .with_prompt("Provider name")
        .default(
            existing
                .as_ref()
                .map_or_else(|| "default".to_string(), |c| c.provider.name.clone()),
        )
        .interact_text()
        .context("Failed to read provider name")?;

    let kinds = [ProviderKind::Okta, ProviderKind::OneLogin];
    let current_kind = existing
        .as_ref()
        .and_then(|c| kinds.iter().position(|k| *k == c.provider.kind))
        .unwrap_or(0);
    let kind = kinds[Select::with_theme(&theme)
        .with_prompt("Provider type")
        .items(&["okta", "onelogin"])
        .default(current_kind)
        .interact()
        .context("Failed to read provider type")?];

    let text = |prompt: &str, current: Option<&str>, required: bool| -> Result<String> {
        let mut input = Input::<String>::with_theme(&theme);
        input = input.with_prompt(prompt).allow_empty(!required);
        if let Some(current) = current {
            input = input.default(current.to_string());
        }
        input
            .interact_text()
            .with_context(|| format!("Failed to read {prompt}"))
    };
    let optional_text = |prompt: &str, current: Option<&str>| -> Result<Option<String>> {
        let value = text(prompt, current, false)?;
        Ok(Some(value.trim().to_string()).filter(|v| !v.is_empty()))
    };

    let old_provider = existing.as_ref().map(|c| &c.provider);
    let old_profile = existing.as_ref().map(|c| &c.profile);

    let base_url = text(
        "IdP base URL",
        old_provider.map(|p| p.base_url.as_str()),
        true,
    )?;
    let username = text(
        "Username",
        old_provider.map(|p| p.username.as_str()),
        true,
    )?;

    let (client_id, client_secret, subdomain) = match kind {
        ProviderKind::OneLogin => {
            let client_id = text(
                "API client ID",
                old_provider.and_then(|p| p.client_id.as_deref()),
                true,
            )?;
            let client_secret = Password::with_theme(&theme)
                .with_prompt("API client secret")
                .interact()
                .context("Failed to read API client secret")?;
            let subdomain = text(
                "Subdomain",
                old_provider.and_then(|p| p.subdomain.as_deref()),
                true,
            )?;
            (Some(client_id), Some(client_secret), Some(subdomain))
        }
        ProviderKind::Okta => (None, None, None),
    };

    let mfa_factor = optional_text(
        "Preferred MFA factor (push, totp, sms; empty to ask)",
        old_provider.and_then(|p| p.mfa_factor.as_deref()),
    )?;

    let use_keychain = Confirm::with_theme(&theme)
        .with_prompt("Store the password in the OS keychain?")
        .default(old_provider.is_none_or(|p| p.use_keychain))
        .interact()
        .context("Failed to read keychain preference")?;

    let app_prompt = match kind {
        ProviderKind::Okta => "AWS app embed URL",
        ProviderKind::OneLogin => "AWS app ID",
    };
    let app = text(app_prompt, old_profile.map(|p| p.app.as_str()), true)?;
    let role = optional_text(
        "Preferred role name or ARN (empty to ask)",
        old_profile.and_then(|p| p.role.as_deref()),
    )?;

    let session_duration = Input::<i32>::with_theme(&theme)
        .with_prompt(format!(
            "Session duration in seconds ({MIN_SESSION_DURATION_SECS}-{MAX_SESSION_DURATION_SECS})"
        ))
        .default(profile_duration_default(existing.as_ref()))
        .validate_with(|input: &i32| validate_duration(*input).map_err(|e| e.to_string()))
        .interact_text()
        .context("Failed to read session duration")?;

    let region = optional_text(
        "AWS region for STS (empty for default)",
        old_profile.and_then(|p| p.region.as_deref()),
    )?;

    let config = Config {
        provider: ProviderConfig {
            name: provider_name.trim().to_string(),
            kind,
            base_url: base_url.trim().to_string(),
            username: username.trim().to_string(),
            mfa_factor,
            session_duration: old_provider.and_then(|p| p.session_duration),
            use_keychain,
            client_id,
            client_secret,
            subdomain,
        },
        profile: ProfileConfig {
            name: profile.to_string(),
            provider: provider_name.trim().to_string(),
            app: app.trim().to_string(),
            role,
            session_duration: Some(session_duration),
            region,
        },
    };

    save(&config).await?;

    println!("\nConfiguration saved successfully.");
    Ok(())
}

/// The profile's own duration; the provider-level cap stays on the provider
fn profile_duration_default(existing: Option<&Config>) -> i32 {
    existing
        .and_then(|c| c.profile.session_duration)
        .unwrap_or(constants::DEFAULT_SESSION_DURATION_SECS)
}

fn get_config_path() -> Result<PathBuf> {
    constants::get_config_path().context("Failed to determine config path")
}
