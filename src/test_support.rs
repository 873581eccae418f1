//! Scripted collaborators for exercising the pipeline without a terminal or network

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::aws::sts::{AssumeRoleRequest, RoleAssumer};
use crate::aws::{Credentials, IamRole};
use crate::error::{AssumeError, IdpError, IdpStage, SecretError};
use crate::idp::{AuthResult, FactorKind, IdentityProvider, MfaFactor, VerifyResult};
use crate::prompt::Interaction;
use crate::saml::SamlAssertion;
use crate::secrets::SecretStore;

fn next<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().unwrap().pop_front()
}

fn exhausted(what: &str) -> io::Error {
    io::Error::other(format!("no scripted {what}"))
}

#[derive(Default)]
pub struct ScriptedInteraction {
    password: Option<String>,
    role_choices: Mutex<VecDeque<usize>>,
    factor_choices: Mutex<VecDeque<usize>>,
    otps: Mutex<VecDeque<String>>,
    password_prompts: AtomicUsize,
    role_prompts: AtomicUsize,
    factor_prompts: AtomicUsize,
    otp_prompts: AtomicUsize,
}

impl ScriptedInteraction {
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_role_choices(self, choices: impl IntoIterator<Item = usize>) -> Self {
        self.role_choices.lock().unwrap().extend(choices);
        self
    }

    pub fn with_factor_choices(self, choices: impl IntoIterator<Item = usize>) -> Self {
        self.factor_choices.lock().unwrap().extend(choices);
        self
    }

    pub fn with_otps<'a>(self, otps: impl IntoIterator<Item = &'a str>) -> Self {
        self.otps
            .lock()
            .unwrap()
            .extend(otps.into_iter().map(String::from));
        self
    }

    pub fn password_prompts(&self) -> usize {
        self.password_prompts.load(Ordering::SeqCst)
    }

    pub fn role_prompts(&self) -> usize {
        self.role_prompts.load(Ordering::SeqCst)
    }

    pub fn factor_prompts(&self) -> usize {
        self.factor_prompts.load(Ordering::SeqCst)
    }

    pub fn otp_prompts(&self) -> usize {
        self.otp_prompts.load(Ordering::SeqCst)
    }
}

impl Interaction for ScriptedInteraction {
    fn read_password(&self, _username: &str) -> io::Result<String> {
        self.password_prompts.fetch_add(1, Ordering::SeqCst);
        self.password.clone().ok_or_else(|| exhausted("password"))
    }

    fn select_factor(&self, _factors: &[MfaFactor]) -> io::Result<usize> {
        self.factor_prompts.fetch_add(1, Ordering::SeqCst);
        next(&self.factor_choices).ok_or_else(|| exhausted("factor choice"))
    }

    fn read_otp(&self, _factor: &MfaFactor) -> io::Result<String> {
        self.otp_prompts.fetch_add(1, Ordering::SeqCst);
        next(&self.otps).ok_or_else(|| exhausted("otp"))
    }

    fn select_role(&self, _roles: &[IamRole]) -> io::Result<usize> {
        self.role_prompts.fetch_add(1, Ordering::SeqCst);
        next(&self.role_choices).ok_or_else(|| exhausted("role choice"))
    }
}

pub fn factor(id: &str, kind: FactorKind) -> MfaFactor {
    MfaFactor {
        id: id.to_string(),
        kind,
        provider: "OKTA".to_string(),
        verification_endpoint: format!("https://idp.example.com/factors/{id}/verify"),
    }
}

/// One recorded `verify_factor` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCall {
    pub factor_id: String,
    pub otp: Option<String>,
}

/// Identity provider returning canned answers.
///
/// Verification answers are consumed in order; once exhausted every call is `Pending`.
pub struct MockProvider {
    auth_result: AuthResult,
    verify_results: Mutex<VecDeque<Result<VerifyResult, IdpError>>>,
    verify_calls: Mutex<Vec<VerifyCall>>,
    assertion: SamlAssertion,
    launches: Mutex<Vec<String>>,
    passwords: Mutex<Vec<String>>,
    rejected_passwords: Vec<String>,
}

impl MockProvider {
    pub fn new(auth_result: AuthResult, assertion: SamlAssertion) -> Self {
        Self {
            auth_result,
            verify_results: Mutex::new(VecDeque::new()),
            verify_calls: Mutex::new(Vec::new()),
            assertion,
            launches: Mutex::new(Vec::new()),
            passwords: Mutex::new(Vec::new()),
            rejected_passwords: Vec::new(),
        }
    }

    /// Answer 401 when authenticating with `password`
    pub fn rejecting_password(mut self, password: &str) -> Self {
        self.rejected_passwords.push(password.to_string());
        self
    }

    pub fn with_verify_results(
        self,
        results: impl IntoIterator<Item = Result<VerifyResult, IdpError>>,
    ) -> Self {
        self.verify_results.lock().unwrap().extend(results);
        self
    }

    pub fn verify_calls(&self) -> Vec<VerifyCall> {
        self.verify_calls.lock().unwrap().clone()
    }

    /// Session tokens passed to `launch_assertion`
    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().unwrap().clone()
    }

    pub fn passwords(&self) -> Vec<String> {
        self.passwords.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn authenticate(&self, _username: &str, password: &str) -> Result<AuthResult, IdpError> {
        self.passwords.lock().unwrap().push(password.to_string());
        if self.rejected_passwords.iter().any(|p| p == password) {
            return Err(IdpError::Status {
                stage: IdpStage::Authenticate,
                status: "401 Unauthorized".to_string(),
                message: "Authentication failed".to_string(),
            });
        }
        Ok(self.auth_result.clone())
    }

    async fn verify_factor(
        &self,
        _state_token: &str,
        factor: &MfaFactor,
        otp: Option<&str>,
    ) -> Result<VerifyResult, IdpError> {
        self.verify_calls.lock().unwrap().push(VerifyCall {
            factor_id: factor.id.clone(),
            otp: otp.map(String::from),
        });
        next(&self.verify_results).unwrap_or(Ok(VerifyResult::Pending))
    }

    async fn launch_assertion(
        &self,
        session_token: &str,
        _app: &str,
    ) -> Result<SamlAssertion, IdpError> {
        self.launches.lock().unwrap().push(session_token.to_string());
        Ok(self.assertion.clone())
    }
}

pub fn expiration() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
}

pub fn credentials(suffix: &str) -> Credentials {
    Credentials {
        access_key_id: format!("ASIA{suffix}"),
        secret_access_key: format!("secret-{suffix}"),
        session_token: format!("token-{suffix}"),
        expiration: expiration(),
    }
}

/// Role assumer replaying canned outcomes and recording requested durations
pub struct MockAssumer {
    results: Mutex<VecDeque<Result<Credentials, AssumeError>>>,
    durations: Mutex<Vec<i32>>,
}

impl MockAssumer {
    pub fn new(results: impl IntoIterator<Item = Result<Credentials, AssumeError>>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            durations: Mutex::new(Vec::new()),
        }
    }

    pub fn durations(&self) -> Vec<i32> {
        self.durations.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleAssumer for MockAssumer {
    async fn assume_role_with_saml(
        &self,
        request: &AssumeRoleRequest<'_>,
    ) -> Result<Credentials, AssumeError> {
        self.durations
            .lock()
            .unwrap()
            .push(request.duration_seconds);
        next(&self.results).unwrap_or(Err(AssumeError::MissingCredentials))
    }
}

/// Base64 SAML response carrying the given role attribute values
pub fn saml_assertion(role_values: &[&str]) -> SamlAssertion {
    let values: String = role_values
        .iter()
        .map(|v| format!("<saml:AttributeValue>{v}</saml:AttributeValue>"))
        .collect();
    let xml = format!(
        r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"><saml:Assertion><saml:AttributeStatement><saml:Attribute Name="https://aws.amazon.com/SAML/Attributes/Role">{values}</saml:Attribute></saml:AttributeStatement></saml:Assertion></samlp:Response>"#
    );
    SamlAssertion::new(STANDARD.encode(xml))
}

pub const ADMIN_ROLE: &str =
    "arn:aws:iam::123456789012:role/Admin,arn:aws:iam::123456789012:saml-provider/Okta";

pub const READONLY_ROLE: &str =
    "arn:aws:iam::123456789012:role/ReadOnly,arn:aws:iam::123456789012:saml-provider/Okta";

/// In-memory secret store; `failing` makes every write fail
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
    failing: bool,
}

impl MemorySecretStore {
    pub fn with_secret(self, key: &str, secret: &str) -> Self {
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), secret.to_string());
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn secret(&self, key: &str) -> Option<String> {
        self.secrets.lock().unwrap().get(key).cloned()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        Ok(self.secret(key))
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), SecretError> {
        if self.failing {
            return Err(SecretError("keychain locked".to_string()));
        }
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), secret.to_string());
        Ok(())
    }
}
