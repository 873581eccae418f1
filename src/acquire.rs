//! The federated credential acquisition pipeline.
//!
//! password -> authenticate -> MFA -> SAML assertion -> role -> STS -> store.
//! Nothing is written to the credential store until every earlier stage has
//! succeeded.

use tracing::{debug, info, warn};

use crate::aws::credentials::{CredentialStore, PersistReport};
use crate::aws::roles::{self, AvailableRoles, IamRole};
use crate::aws::sts::{self, AssumedRole, RoleAssumer};
use crate::error::AcquireError;
use crate::idp::IdentityProvider;
use crate::mfa::MfaVerifier;
use crate::prompt::Interaction;
use crate::secrets::SecretStore;

/// Where the acquired credentials are written
#[derive(Debug, Clone, Copy)]
pub struct PersistTarget<'a> {
    pub store: &'a CredentialStore,
    pub profile: &'a str,
}

#[derive(Debug, Clone)]
pub struct AcquireRequest<'a> {
    pub username: &'a str,
    /// Okta app embed URL or OneLogin app id
    pub app: &'a str,
    /// Preferred role name or ARN
    pub role: Option<&'a str>,
    pub duration_seconds: i32,
    /// Keychain account for the password; `None` always prompts
    pub secret_key: Option<&'a str>,
    pub persist: Option<PersistTarget<'a>>,
}

#[derive(Debug, Clone)]
pub struct Acquired {
    pub role: IamRole,
    pub assumed: AssumedRole,
    pub report: Option<PersistReport>,
}

/// Collaborators of one acquisition run
pub struct Acquisition<'a> {
    pub provider: &'a dyn IdentityProvider,
    pub assumer: &'a dyn RoleAssumer,
    pub interaction: &'a dyn Interaction,
    pub secrets: Option<&'a dyn SecretStore>,
    pub mfa: MfaVerifier,
}

impl Acquisition<'_> {
    pub async fn run(&self, request: &AcquireRequest<'_>) -> Result<Acquired, AcquireError> {
        let (mut password, mut from_store) = self.password(request)?;

        info!("Authenticating {} with the identity provider", request.username);
        let auth = match self.provider.authenticate(request.username, &password).await {
            Err(e) if from_store && e.is_rejection() => {
                warn!("Stored password was rejected ({}), asking again", e);
                password = self.prompt_password(request)?;
                from_store = false;
                self.provider.authenticate(request.username, &password).await
            }
            result => result,
        }
        .map_err(AcquireError::Authenticate)?;

        if !from_store {
            self.remember_password(request, &password);
        }

        let session_token = self
            .mfa
            .verify(self.provider, auth, self.interaction)
            .await?;

        info!("Requesting SAML assertion");
        let assertion = self
            .provider
            .launch_assertion(&session_token, request.app)
            .await
            .map_err(AcquireError::Launch)?;

        let response = assertion.decode()?;
        let available = AvailableRoles::try_from(roles::extract_roles(&response)?)?;
        let role = available.select(request.role, self.interaction)?;
        debug!("Assuming role {} via {}", role.role_arn, role.principal_arn);

        let assumed =
            sts::assume_role(self.assumer, &role, &assertion, request.duration_seconds).await?;
        if assumed.reduced {
            warn!(
                "Session duration reduced to {}s; raise MaxSessionDuration on {} to allow {}s",
                assumed.duration_seconds, role.role_arn, request.duration_seconds
            );
        }

        let report = match request.persist {
            Some(target) => Some(
                target
                    .store
                    .persist(target.profile, &assumed.credentials)
                    .await?,
            ),
            None => None,
        };

        Ok(Acquired {
            role,
            assumed,
            report,
        })
    }

    /// Stored password if there is one, otherwise a prompt.
    /// The flag tells whether the password came from the store.
    fn password(&self, request: &AcquireRequest<'_>) -> Result<(String, bool), AcquireError> {
        if let (Some(secrets), Some(key)) = (self.secrets, request.secret_key) {
            match secrets.get(key) {
                Ok(Some(password)) => {
                    debug!("Using password from keychain");
                    return Ok((password, true));
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read password from keychain: {}", e),
            }
        }

        self.prompt_password(request)
            .map(|password| (password, false))
    }

    fn prompt_password(&self, request: &AcquireRequest<'_>) -> Result<String, AcquireError> {
        self.interaction
            .read_password(request.username)
            .map_err(|e| AcquireError::Password(e.to_string()))
    }

    fn remember_password(&self, request: &AcquireRequest<'_>, password: &str) {
        if let (Some(secrets), Some(key)) = (self.secrets, request.secret_key) {
            match secrets.set(key, password) {
                Ok(()) => debug!("Password saved to keychain"),
                Err(e) => warn!("Failed to save password to keychain: {}", e),
            }
        }
    }
}
