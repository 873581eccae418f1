pub mod okta;
pub mod onelogin;

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::fmt;

use self::okta::OktaProvider;
use self::onelogin::OneLoginProvider;
use crate::error::{IdpError, IdpStage};
use crate::saml::SamlAssertion;

/// Kind of second factor offered by an identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactorKind {
    Push,
    Totp,
    Sms,
    Other(String),
}

impl FactorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Push => "push",
            Self::Totp => "totp",
            Self::Sms => "sms",
            Self::Other(name) => name,
        }
    }
}

/// A second factor enrolled for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaFactor {
    pub id: String,
    pub kind: FactorKind,
    /// Vendor of the factor as reported by the IdP (e.g. OKTA, GOOGLE)
    pub provider: String,
    pub verification_endpoint: String,
}

impl fmt::Display for MfaFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.as_str(), self.provider)
    }
}

/// Outcome of primary authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Success(String),
    MfaRequired {
        state_token: String,
        factors: Vec<MfaFactor>,
    },
}

/// Outcome of a single factor verification call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Success(String),
    /// Push not yet acknowledged
    Pending,
}

/// Operations every supported IdP must provide
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthResult, IdpError>;

    async fn verify_factor(
        &self,
        state_token: &str,
        factor: &MfaFactor,
        otp: Option<&str>,
    ) -> Result<VerifyResult, IdpError>;

    async fn launch_assertion(
        &self,
        session_token: &str,
        app: &str,
    ) -> Result<SamlAssertion, IdpError>;
}

/// Identity Provider enum using composition pattern
/// Each variant contains a provider-specific struct with its own implementation
#[derive(Debug)]
pub enum Provider {
    Okta(OktaProvider),
    OneLogin(OneLoginProvider),
}

#[async_trait]
impl IdentityProvider for Provider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthResult, IdpError> {
        match self {
            Self::Okta(provider) => provider.authenticate(username, password).await,
            Self::OneLogin(provider) => provider.authenticate(username, password).await,
        }
    }

    async fn verify_factor(
        &self,
        state_token: &str,
        factor: &MfaFactor,
        otp: Option<&str>,
    ) -> Result<VerifyResult, IdpError> {
        match self {
            Self::Okta(provider) => provider.verify_factor(state_token, factor, otp).await,
            Self::OneLogin(provider) => provider.verify_factor(state_token, factor, otp).await,
        }
    }

    async fn launch_assertion(
        &self,
        session_token: &str,
        app: &str,
    ) -> Result<SamlAssertion, IdpError> {
        match self {
            Self::Okta(provider) => provider.launch_assertion(session_token, app).await,
            Self::OneLogin(provider) => provider.launch_assertion(session_token, app).await,
        }
    }
}

/// Check the status and decode a JSON body, keeping the IdP's own error text
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    stage: IdpStage,
) -> Result<T, IdpError> {
    let body = read_body(response, stage).await?;
    serde_json::from_str(&body).map_err(|e| IdpError::UnexpectedResponse {
        stage,
        message: e.to_string(),
    })
}

/// Check the status and return the raw body
pub(crate) async fn read_body(response: Response, stage: IdpStage) -> Result<String, IdpError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| IdpError::Transport { stage, source })?;

    if !status.is_success() {
        return Err(IdpError::Status {
            stage,
            status: status.to_string(),
            message: error_message(&body),
        });
    }
    Ok(body)
}

/// Pull a human readable message out of an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["errorSummary", "message", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or_else(|| truncate_body(body))
}

/// Summarize an error body for inclusion in messages
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
