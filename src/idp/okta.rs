use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{AuthResult, FactorKind, IdentityProvider, MfaFactor, VerifyResult, read_body, read_json};
use crate::error::{IdpError, IdpStage};
use crate::saml::SamlAssertion;

// Okta authentication API types (internal use only)

#[derive(Debug, Serialize)]
struct AuthnRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    state_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass_code: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthnResponse {
    status: String,
    session_token: Option<String>,
    state_token: Option<String>,
    factor_result: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    factors: Vec<OktaFactor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OktaFactor {
    id: String,
    factor_type: String,
    #[serde(default)]
    provider: String,
    #[serde(rename = "_links")]
    links: FactorLinks,
}

#[derive(Debug, Deserialize)]
struct FactorLinks {
    verify: Link,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

impl From<OktaFactor> for MfaFactor {
    fn from(factor: OktaFactor) -> Self {
        let kind = match factor.factor_type.as_str() {
            "push" => FactorKind::Push,
            "token:software:totp" | "token" | "token:hardware" => FactorKind::Totp,
            "sms" => FactorKind::Sms,
            other => FactorKind::Other(other.to_string()),
        };
        MfaFactor {
            id: factor.id,
            kind,
            provider: factor.provider,
            verification_endpoint: factor.links.verify.href,
        }
    }
}

/// Okta provider using the authentication API and app embed links
#[derive(Debug, Clone)]
pub struct OktaProvider {
    client: Client,
    base_url: String,
}

impl OktaProvider {
    /// Create a provider for an Okta organization (e.g. https://example.okta.com)
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for OktaProvider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthResult, IdpError> {
        let stage = IdpStage::Authenticate;
        info!("Authenticating {} against Okta", username);

        let response = self
            .client
            .post(format!("{}/api/v1/authn", self.base_url))
            .json(&AuthnRequest { username, password })
            .send()
            .await
            .map_err(|source| IdpError::Transport { stage, source })?;
        let AuthnResponse {
            status,
            session_token,
            state_token,
            embedded,
            ..
        } = read_json(response, stage).await?;
        debug!("Okta authn status: {}", status);

        match status.as_str() {
            "SUCCESS" => require_session_token(session_token, stage).map(AuthResult::Success),
            "MFA_REQUIRED" => {
                let state_token = state_token.ok_or_else(|| IdpError::UnexpectedResponse {
                    stage,
                    message: "MFA_REQUIRED response without stateToken".to_string(),
                })?;
                let factors = embedded
                    .map(|e| e.factors.into_iter().map(MfaFactor::from).collect())
                    .unwrap_or_default();
                Ok(AuthResult::MfaRequired {
                    state_token,
                    factors,
                })
            }
            other => Err(IdpError::Rejected {
                stage,
                message: format!("account status {other}"),
            }),
        }
    }

    async fn verify_factor(
        &self,
        state_token: &str,
        factor: &MfaFactor,
        otp: Option<&str>,
    ) -> Result<VerifyResult, IdpError> {
        let stage = IdpStage::VerifyFactor;

        let response = self
            .client
            .post(&factor.verification_endpoint)
            .json(&VerifyRequest {
                state_token,
                pass_code: otp,
            })
            .send()
            .await
            .map_err(|source| IdpError::Transport { stage, source })?;
        let AuthnResponse {
            status,
            session_token,
            factor_result,
            ..
        } = read_json(response, stage).await?;

        match (status.as_str(), factor_result.as_deref()) {
            ("SUCCESS", _) => require_session_token(session_token, stage).map(VerifyResult::Success),
            ("MFA_CHALLENGE", Some("WAITING" | "CHALLENGE")) => Ok(VerifyResult::Pending),
            ("MFA_CHALLENGE", Some("REJECTED")) => Err(IdpError::Rejected {
                stage,
                message: "push notification was rejected".to_string(),
            }),
            ("MFA_CHALLENGE", Some("TIMEOUT")) => Err(IdpError::Rejected {
                stage,
                message: "push notification timed out".to_string(),
            }),
            (status, result) => Err(IdpError::UnexpectedResponse {
                stage,
                message: format!("status {status}, factor result {}", result.unwrap_or("none")),
            }),
        }
    }

    async fn launch_assertion(
        &self,
        session_token: &str,
        app: &str,
    ) -> Result<SamlAssertion, IdpError> {
        let stage = IdpStage::LaunchAssertion;

        let mut url = Url::parse(app).map_err(|e| IdpError::UnexpectedResponse {
            stage,
            message: format!("invalid app URL '{app}': {e}"),
        })?;
        url.query_pairs_mut()
            .append_pair("sessionToken", session_token);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| IdpError::Transport { stage, source })?;
        let html = read_body(response, stage).await?;

        extract_saml_response(&html)
            .map(SamlAssertion::new)
            .ok_or_else(|| IdpError::UnexpectedResponse {
                stage,
                message: "no SAMLResponse found in app launch page".to_string(),
            })
    }
}

fn require_session_token(token: Option<String>, stage: IdpStage) -> Result<String, IdpError> {
    token.ok_or_else(|| IdpError::UnexpectedResponse {
        stage,
        message: "SUCCESS response without sessionToken".to_string(),
    })
}

/// Find the SAMLResponse form input and return its unescaped value
fn extract_saml_response(html: &str) -> Option<String> {
    let marker = html.find("name=\"SAMLResponse\"")?;
    let tag_start = html[..marker].rfind('<')?;
    let tag_end = marker + html[marker..].find('>')?;
    let tag = &html[tag_start..tag_end];

    let value_start = tag.find("value=\"")? + "value=\"".len();
    let value_len = tag[value_start..].find('"')?;
    let raw = &tag[value_start..value_start + value_len];

    quick_xml::escape::unescape(raw)
        .ok()
        .map(|value| value.into_owned())
}
