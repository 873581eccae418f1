use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashSet, fmt, sync::Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{AuthResult, FactorKind, IdentityProvider, MfaFactor, VerifyResult, read_json};
use crate::error::{IdpError, IdpStage};
use crate::saml::SamlAssertion;

// OneLogin API v2 types (internal use only)

#[derive(Debug, Serialize)]
struct TokenRequest {
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct AssertionRequest<'a> {
    username_or_email: &'a str,
    password: &'a str,
    app_id: &'a str,
    subdomain: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    app_id: &'a str,
    device_id: &'a str,
    state_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    otp_token: Option<&'a str>,
    do_not_notify: bool,
}

#[derive(Debug, Deserialize)]
struct AssertionResponse {
    data: Option<String>,
    message: Option<String>,
    state_token: Option<String>,
    callback_url: Option<String>,
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
    device_id: Value,
    device_type: String,
}

impl Device {
    fn into_factor(self, verification_endpoint: &str) -> MfaFactor {
        let id = match self.device_id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        let kind = if self.device_type == "OneLogin Protect" {
            FactorKind::Push
        } else if self.device_type.to_ascii_uppercase().contains("SMS") {
            FactorKind::Sms
        } else {
            FactorKind::Totp
        };
        MfaFactor {
            id,
            kind,
            provider: self.device_type,
            verification_endpoint: verification_endpoint.to_string(),
        }
    }
}

/// Connection settings for a OneLogin account
#[derive(Clone)]
pub struct OneLoginSettings {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub subdomain: String,
    pub app_id: String,
}

/// OneLogin provider.
///
/// The SAML assertion API returns the assertion itself once the user is
/// verified, so the "session token" handed around is the assertion.
pub struct OneLoginProvider {
    client: Client,
    settings: OneLoginSettings,
    access_token: OnceCell<String>,
    notified: Mutex<HashSet<String>>,
}

impl fmt::Debug for OneLoginProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneLoginProvider")
            .field("base_url", &self.settings.base_url)
            .field("subdomain", &self.settings.subdomain)
            .field("app_id", &self.settings.app_id)
            .finish_non_exhaustive()
    }
}

impl OneLoginProvider {
    pub fn new(client: Client, mut settings: OneLoginSettings) -> Self {
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();
        Self {
            client,
            settings,
            access_token: OnceCell::new(),
            notified: Mutex::new(HashSet::new()),
        }
    }

    fn verify_url(&self) -> String {
        format!("{}/api/2/saml_assertion/verify_factor", self.settings.base_url)
    }

    /// API access token, fetched on first use
    async fn access_token(&self) -> Result<&str, IdpError> {
        let token = self
            .access_token
            .get_or_try_init(|| async {
                let stage = IdpStage::AccessToken;
                debug!("Requesting OneLogin API access token");
                let response = self
                    .client
                    .post(format!("{}/auth/oauth2/v2/token", self.settings.base_url))
                    .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
                    .json(&TokenRequest {
                        grant_type: "client_credentials",
                    })
                    .send()
                    .await
                    .map_err(|source| IdpError::Transport { stage, source })?;
                let token: TokenResponse = read_json(response, stage).await?;
                Ok::<_, IdpError>(token.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    /// Only the first push poll for a state token should notify the device
    fn should_notify(&self, state_token: &str, otp: Option<&str>) -> bool {
        if otp.is_some() {
            return false;
        }
        match self.notified.lock() {
            Ok(mut notified) => notified.insert(state_token.to_string()),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl IdentityProvider for OneLoginProvider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthResult, IdpError> {
        let token = self.access_token().await?;
        let stage = IdpStage::Authenticate;
        info!("Authenticating {} against OneLogin", username);

        let response = self
            .client
            .post(format!("{}/api/2/saml_assertion", self.settings.base_url))
            .bearer_auth(token)
            .json(&AssertionRequest {
                username_or_email: username,
                password,
                app_id: &self.settings.app_id,
                subdomain: &self.settings.subdomain,
            })
            .send()
            .await
            .map_err(|source| IdpError::Transport { stage, source })?;
        let body: AssertionResponse = read_json(response, stage).await?;

        if let Some(assertion) = body.data {
            return Ok(AuthResult::Success(assertion));
        }

        let Some(state_token) = body.state_token else {
            return Err(IdpError::UnexpectedResponse {
                stage,
                message: body
                    .message
                    .unwrap_or_else(|| "response has neither data nor state_token".to_string()),
            });
        };

        let verify_url = body.callback_url.unwrap_or_else(|| self.verify_url());
        let factors = body
            .devices
            .into_iter()
            .map(|device| device.into_factor(&verify_url))
            .collect();
        Ok(AuthResult::MfaRequired {
            state_token,
            factors,
        })
    }

    async fn verify_factor(
        &self,
        state_token: &str,
        factor: &MfaFactor,
        otp: Option<&str>,
    ) -> Result<VerifyResult, IdpError> {
        let token = self.access_token().await?;
        let stage = IdpStage::VerifyFactor;
        let do_not_notify = !self.should_notify(state_token, otp);

        let response = self
            .client
            .post(&factor.verification_endpoint)
            .bearer_auth(token)
            .json(&VerifyRequest {
                app_id: &self.settings.app_id,
                device_id: &factor.id,
                state_token,
                otp_token: otp,
                do_not_notify,
            })
            .send()
            .await
            .map_err(|source| IdpError::Transport { stage, source })?;
        let body: AssertionResponse = read_json(response, stage).await?;

        match (body.data, body.message) {
            (Some(assertion), _) => Ok(VerifyResult::Success(assertion)),
            (None, Some(message)) if message.to_ascii_lowercase().contains("pending") => {
                Ok(VerifyResult::Pending)
            }
            (None, message) => Err(IdpError::Rejected {
                stage,
                message: message.unwrap_or_else(|| "factor was not verified".to_string()),
            }),
        }
    }

    async fn launch_assertion(
        &self,
        session_token: &str,
        _app: &str,
    ) -> Result<SamlAssertion, IdpError> {
        Ok(SamlAssertion::new(session_token))
    }
}
