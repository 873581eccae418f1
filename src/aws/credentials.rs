use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use ini::{Ini, Properties};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::Credentials;
use crate::error::StoreError;
use crate::ini_file;

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";
const EXPIRATION: &str = "aws_expiration";

/// Outcome of a persist beyond the written profile itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Sections removed because their expiration had passed
    pub pruned: Vec<String>,
    /// Sections kept although their expiration could not be parsed
    pub unparsable: Vec<String>,
}

/// A stored profile that is still valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProfile {
    pub name: String,
    pub credentials: Credentials,
    pub expires_at: DateTime<Utc>,
    pub remaining: TimeDelta,
}

/// INI-backed shared credentials file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

enum Expiry {
    Missing,
    Invalid(String),
    At(DateTime<Utc>),
}

fn expiry(section: &Properties) -> Expiry {
    match section.get(EXPIRATION) {
        None => Expiry::Missing,
        Some(value) => match DateTime::parse_from_rfc3339(value.trim()) {
            Ok(at) => Expiry::At(at.with_timezone(&Utc)),
            Err(_) => Expiry::Invalid(value.to_string()),
        },
    }
}

pub fn format_expiration(expiration: &DateTime<Utc>) -> String {
    expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `credentials` under `profile` and prune expired sections
    pub async fn persist(
        &self,
        profile: &str,
        credentials: &Credentials,
    ) -> Result<PersistReport, StoreError> {
        self.persist_at(profile, credentials, Utc::now()).await
    }

    pub async fn persist_at(
        &self,
        profile: &str,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<PersistReport, StoreError> {
        let current = self.read().await?.unwrap_or_default();
        let mut report = PersistReport::default();
        let mut ini = Ini::new();

        for (name, section) in current.iter() {
            if name == Some(profile) {
                continue;
            }
            match (name, expiry(section)) {
                (Some(name), Expiry::At(at)) if at < now => {
                    debug!("Pruning expired profile: {}", name);
                    report.pruned.push(name.to_string());
                    continue;
                }
                (Some(name), Expiry::Invalid(value)) => {
                    warn!(
                        "Keeping profile '{}' with unparsable {}: {}",
                        name, EXPIRATION, value
                    );
                    report.unparsable.push(name.to_string());
                }
                _ => {}
            }
            if name.is_none() && section.is_empty() {
                continue;
            }
            let mut setter = ini.with_section(name);
            for (key, value) in section.iter() {
                setter.set(key, value);
            }
        }

        ini.with_section(Some(profile))
            .set(ACCESS_KEY_ID, &credentials.access_key_id)
            .set(SECRET_ACCESS_KEY, &credentials.secret_access_key)
            .set(SESSION_TOKEN, &credentials.session_token)
            .set(EXPIRATION, format_expiration(&credentials.expiration));

        self.write(&ini).await?;

        info!("Credentials saved to profile: {}", profile);
        Ok(report)
    }

    /// Profiles whose credentials have not yet expired, in file order
    pub async fn list_valid(&self) -> Result<Vec<StoredProfile>, StoreError> {
        self.list_valid_at(Utc::now()).await
    }

    pub async fn list_valid_at(&self, now: DateTime<Utc>) -> Result<Vec<StoredProfile>, StoreError> {
        let Some(ini) = self.read().await? else {
            return Ok(Vec::new());
        };

        let mut profiles = Vec::new();
        for (name, section) in ini.iter() {
            let Some(name) = name else { continue };
            let Expiry::At(expires_at) = expiry(section) else {
                continue;
            };
            if expires_at <= now {
                continue;
            }
            match section_credentials(name, section) {
                Ok(credentials) => profiles.push(StoredProfile {
                    name: name.to_string(),
                    credentials,
                    expires_at,
                    remaining: expires_at - now,
                }),
                Err(e) => debug!("Skipping profile {}: {}", name, e),
            }
        }
        Ok(profiles)
    }

    /// Read one stored profile back
    pub async fn load(&self, profile: &str) -> Result<Credentials, StoreError> {
        let ini = self
            .read()
            .await?
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_string()))?;

        let section = ini
            .section(Some(profile))
            .ok_or_else(|| StoreError::ProfileNotFound(profile.to_string()))?;

        section_credentials(profile, section)
    }

    async fn read(&self) -> Result<Option<Ini>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        ini_file::parse(&content)
            .map(Some)
            .map_err(|e| StoreError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    async fn write(&self, ini: &Ini) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let buffer = ini_file::render(ini).map_err(io_err)?;
        ini_file::write_private(&self.path, &buffer)
            .await
            .map_err(io_err)
    }
}

fn section_credentials(profile: &str, section: &Properties) -> Result<Credentials, StoreError> {
    let field = |key: &'static str| {
        section
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| StoreError::MissingField {
                profile: profile.to_string(),
                key,
            })
    };

    let access_key_id = field(ACCESS_KEY_ID)?;
    let secret_access_key = field(SECRET_ACCESS_KEY)?;
    let session_token = field(SESSION_TOKEN)?;
    let expiration = match expiry(section) {
        Expiry::At(at) => at,
        Expiry::Missing => {
            return Err(StoreError::MissingField {
                profile: profile.to_string(),
                key: EXPIRATION,
            });
        }
        Expiry::Invalid(value) => {
            return Err(StoreError::InvalidExpiration {
                profile: profile.to_string(),
                value,
            });
        }
    };

    Ok(Credentials {
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    })
}
