//! Error types for each stage of credential acquisition

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Failures while decoding a SAML response
#[derive(Debug, Error)]
pub enum SamlError {
    #[error("SAML response is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("SAML response is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("SAML response is not well-formed XML: {0}")]
    Xml(String),

    #[error("SAML response contains no XML document")]
    Empty,
}

/// Failures while choosing a role out of an assertion
#[derive(Debug, Error)]
pub enum RoleError {
    #[error("No valid roles returned in the SAML assertion")]
    NoRoles,

    #[error("Role '{name}' not found. Available roles: {available}")]
    NotFound { name: String, available: String },

    #[error("Specified role '{name}' does not match the only available role '{available}'")]
    Mismatch { name: String, available: String },

    #[error("No valid role selected after {attempts} attempts")]
    AmbiguousSelection { attempts: usize },

    #[error("Role selection failed: {0}")]
    Prompt(#[source] io::Error),
}

/// The identity provider call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdpStage {
    AccessToken,
    Authenticate,
    VerifyFactor,
    LaunchAssertion,
}

impl fmt::Display for IdpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AccessToken => "access token",
            Self::Authenticate => "authentication",
            Self::VerifyFactor => "factor verification",
            Self::LaunchAssertion => "assertion launch",
        };
        f.write_str(name)
    }
}

/// Failures talking to an identity provider
#[derive(Debug, Error)]
pub enum IdpError {
    #[error("{stage} request failed: {source}")]
    Transport {
        stage: IdpStage,
        #[source]
        source: reqwest::Error,
    },

    #[error("{stage} failed with HTTP {status}: {message}")]
    Status {
        stage: IdpStage,
        status: String,
        message: String,
    },

    #[error("{stage} returned an unexpected response: {message}")]
    UnexpectedResponse { stage: IdpStage, message: String },

    #[error("{stage} rejected: {message}")]
    Rejected { stage: IdpStage, message: String },
}

impl IdpError {
    /// The IdP refused what was sent (bad credentials, denied factor), as opposed to being unreachable
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Rejected { .. } => true,
            Self::Status { status, .. } => status.starts_with('4'),
            Self::Transport { .. } | Self::UnexpectedResponse { .. } => false,
        }
    }

    pub fn stage(&self) -> IdpStage {
        match self {
            Self::Transport { stage, .. }
            | Self::Status { stage, .. }
            | Self::UnexpectedResponse { stage, .. }
            | Self::Rejected { stage, .. } => *stage,
        }
    }
}

/// Failures while verifying a second factor
#[derive(Debug, Error)]
pub enum MfaError {
    #[error("MFA is required but the identity provider offered no factors")]
    NoFactors,

    #[error("No valid MFA factor selected after {attempts} attempts")]
    Selection { attempts: usize },

    #[error("MFA factor '{factor}' was not verified")]
    NotVerified { factor: String },

    #[error("Failed to read MFA input: {0}")]
    Prompt(#[source] io::Error),

    #[error(transparent)]
    Idp(#[from] IdpError),
}

/// Failures from the role assumption API
#[derive(Debug, Error)]
pub enum AssumeError {
    #[error("Requested duration of {requested}s exceeds the role's maximum session duration: {message}")]
    DurationExceeded { requested: i32, message: String },

    #[error("AssumeRoleWithSAML failed ({code}): {message}")]
    Api { code: String, message: String },

    #[error("AssumeRoleWithSAML request failed: {0}")]
    Transport(String),

    #[error("AWS STS returned no credentials")]
    MissingCredentials,
}

/// Failures reading or writing the credentials file
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access credentials file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse credentials file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Profile '{0}' not found in credentials file")]
    ProfileNotFound(String),

    #[error("Profile '{profile}' is missing {key}")]
    MissingField { profile: String, key: &'static str },

    #[error("Profile '{profile}' has an invalid expiration '{value}'")]
    InvalidExpiration { profile: String, value: String },
}

/// Failures from the secret storage backend
#[derive(Debug, Error)]
#[error("Secret storage error: {0}")]
pub struct SecretError(pub String);

/// A failed acquisition, tagged with the stage that aborted it
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Failed to obtain password: {0}")]
    Password(String),

    #[error("Authentication failed: {0}")]
    Authenticate(#[source] IdpError),

    #[error("MFA verification failed: {0}")]
    Mfa(#[from] MfaError),

    #[error("Failed to obtain SAML assertion: {0}")]
    Launch(#[source] IdpError),

    #[error("Failed to decode SAML assertion: {0}")]
    Saml(#[from] SamlError),

    #[error("Failed to select role: {0}")]
    Role(#[from] RoleError),

    #[error("Failed to assume role: {0}")]
    AssumeRole(#[from] AssumeError),

    #[error("Failed to save credentials: {0}")]
    Persist(#[from] StoreError),
}
