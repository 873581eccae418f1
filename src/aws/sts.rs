use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::Client as StsClient;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{Credentials, IamRole};
use crate::constants::{
    DEFAULT_AWS_REGION, DEFAULT_SESSION_DURATION_SECS, FALLBACK_SESSION_DURATION_SECS,
};
use crate::error::AssumeError;
use crate::saml::SamlAssertion;

/// Parameters of one AssumeRoleWithSAML call
#[derive(Debug, Clone, Copy)]
pub struct AssumeRoleRequest<'a> {
    pub role_arn: &'a str,
    pub principal_arn: &'a str,
    pub assertion: &'a SamlAssertion,
    pub duration_seconds: i32,
}

#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role_with_saml(
        &self,
        request: &AssumeRoleRequest<'_>,
    ) -> Result<Credentials, AssumeError>;
}

/// Role assumer backed by AWS STS
#[derive(Debug, Clone)]
pub struct StsRoleAssumer {
    client: StsClient,
}

impl StsRoleAssumer {
    /// Load the SDK configuration.
    /// Priority: explicit region -> ENV vars / shared config -> DEFAULT_AWS_REGION
    pub async fn new(region: Option<&str>) -> Self {
        // AssumeRoleWithSAML is an unsigned call
        let loader = aws_config::defaults(BehaviorVersion::latest()).no_credentials();
        let config = match region {
            Some(region) => {
                info!("Using region: {}", region);
                loader.region(Region::new(region.to_string())).load().await
            }
            None => {
                let loaded = loader.load().await;
                match loaded.region() {
                    Some(region) => {
                        info!("Using region: {}", region);
                        loaded
                    }
                    None => {
                        info!(
                            "No region configured, using default {} for STS",
                            DEFAULT_AWS_REGION
                        );
                        loaded
                            .into_builder()
                            .region(Region::new(DEFAULT_AWS_REGION))
                            .build()
                    }
                }
            }
        };

        Self {
            client: StsClient::new(&config),
        }
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role_with_saml(
        &self,
        request: &AssumeRoleRequest<'_>,
    ) -> Result<Credentials, AssumeError> {
        info!("Calling AWS STS AssumeRoleWithSAML");
        debug!("Role ARN: {}", request.role_arn);
        debug!("Principal ARN: {}", request.principal_arn);
        debug!("Duration: {} seconds", request.duration_seconds);

        let response = self
            .client
            .assume_role_with_saml()
            .role_arn(request.role_arn)
            .principal_arn(request.principal_arn)
            .saml_assertion(request.assertion.as_str())
            .duration_seconds(request.duration_seconds)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service) => {
                    let err = service.err();
                    classify_service_error(err.code(), err.message(), request.duration_seconds)
                }
                other => AssumeError::Transport(DisplayErrorContext(other).to_string()),
            })?;

        let sts_creds = response
            .credentials()
            .ok_or(AssumeError::MissingCredentials)?;

        let expiration = sts_creds.expiration();
        let expiration = DateTime::<Utc>::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .ok_or(AssumeError::MissingCredentials)?;

        info!("Successfully obtained AWS credentials");
        Ok(Credentials {
            access_key_id: sts_creds.access_key_id().to_string(),
            secret_access_key: sts_creds.secret_access_key().to_string(),
            session_token: sts_creds.session_token().to_string(),
            expiration,
        })
    }
}

fn classify_service_error(
    code: Option<&str>,
    message: Option<&str>,
    requested: i32,
) -> AssumeError {
    let code = code.unwrap_or("Unknown");
    let message = message.unwrap_or_default().to_string();

    if code == "ValidationError"
        && (message.contains("DurationSeconds") || message.contains("MaxSessionDuration"))
    {
        return AssumeError::DurationExceeded { requested, message };
    }

    AssumeError::Api {
        code: code.to_string(),
        message,
    }
}

/// Credentials from a successful assumption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumedRole {
    pub credentials: Credentials,
    pub duration_seconds: i32,
    /// The requested duration was rejected and the fallback was used
    pub reduced: bool,
}

/// Assume `role`, retrying once with the fallback duration if the requested one
/// exceeds the role's maximum session duration
pub async fn assume_role(
    assumer: &dyn RoleAssumer,
    role: &IamRole,
    assertion: &SamlAssertion,
    requested: i32,
) -> Result<AssumedRole, AssumeError> {
    let mut request = AssumeRoleRequest {
        role_arn: &role.role_arn,
        principal_arn: &role.principal_arn,
        assertion,
        duration_seconds: requested,
    };

    match assumer.assume_role_with_saml(&request).await {
        Ok(credentials) => Ok(AssumedRole {
            credentials,
            duration_seconds: requested,
            reduced: false,
        }),
        Err(AssumeError::DurationExceeded { message, .. })
            if requested > FALLBACK_SESSION_DURATION_SECS =>
        {
            warn!(
                "Session duration of {}s was rejected ({}), retrying with {}s",
                requested, message, FALLBACK_SESSION_DURATION_SECS
            );
            request.duration_seconds = FALLBACK_SESSION_DURATION_SECS;
            let credentials = assumer.assume_role_with_saml(&request).await?;
            Ok(AssumedRole {
                credentials,
                duration_seconds: FALLBACK_SESSION_DURATION_SECS,
                reduced: true,
            })
        }
        Err(e) => Err(e),
    }
}

/// Session duration from provider-level and app-level settings
pub fn effective_duration(provider: Option<i32>, app: Option<i32>) -> i32 {
    match (provider, app) {
        (Some(provider), Some(app)) => provider.min(app),
        (Some(provider), None) => provider,
        (None, Some(app)) => app,
        (None, None) => DEFAULT_SESSION_DURATION_SECS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockAssumer, credentials};

    fn role() -> IamRole {
        IamRole {
            name: "Admin".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/Admin".to_string(),
            principal_arn: "arn:aws:iam::123456789012:saml-provider/Okta".to_string(),
        }
    }

    fn exceeded(requested: i32) -> AssumeError {
        AssumeError::DurationExceeded {
            requested,
            message: "The requested DurationSeconds exceeds the MaxSessionDuration set for this role."
                .to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_try_success() {
        let assumer = MockAssumer::new([Ok(credentials("A"))]);
        let assumed = assume_role(&assumer, &role(), &SamlAssertion::new("x"), 7200)
            .await
            .unwrap();

        assert_eq!(assumed.credentials, credentials("A"));
        assert_eq!(assumed.duration_seconds, 7200);
        assert!(!assumed.reduced);
        assert_eq!(assumer.durations(), vec![7200]);
    }

    #[tokio::test]
    async fn test_duration_exceeded_retries_once_with_fallback() {
        let assumer = MockAssumer::new([Err(exceeded(43200)), Ok(credentials("B"))]);
        let assumed = assume_role(&assumer, &role(), &SamlAssertion::new("x"), 43200)
            .await
            .unwrap();

        assert!(assumed.reduced);
        assert_eq!(assumed.duration_seconds, FALLBACK_SESSION_DURATION_SECS);
        assert_eq!(assumed.credentials, credentials("B"));
        assert_eq!(assumer.durations(), vec![43200, 3600]);
    }

    #[tokio::test]
    async fn test_second_duration_exceeded_is_terminal() {
        let assumer = MockAssumer::new([Err(exceeded(43200)), Err(exceeded(3600))]);
        let err = assume_role(&assumer, &role(), &SamlAssertion::new("x"), 43200)
            .await
            .unwrap_err();

        assert!(matches!(err, AssumeError::DurationExceeded { requested: 3600, .. }));
        assert_eq!(assumer.durations(), vec![43200, 3600]);
    }

    #[tokio::test]
    async fn test_duration_exceeded_at_fallback_is_not_retried() {
        let assumer = MockAssumer::new([Err(exceeded(3600)), Ok(credentials("C"))]);
        let err = assume_role(&assumer, &role(), &SamlAssertion::new("x"), 3600)
            .await
            .unwrap_err();

        assert!(matches!(err, AssumeError::DurationExceeded { .. }));
        assert_eq!(assumer.durations(), vec![3600]);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let assumer = MockAssumer::new([
            Err(AssumeError::Api {
                code: "AccessDenied".to_string(),
                message: "Not authorized".to_string(),
            }),
            Ok(credentials("D")),
        ]);
        let err = assume_role(&assumer, &role(), &SamlAssertion::new("x"), 7200)
            .await
            .unwrap_err();

        assert!(matches!(err, AssumeError::Api { ref code, .. } if code == "AccessDenied"));
        assert_eq!(assumer.durations(), vec![7200]);
    }

    #[test]
    fn test_classify_duration_validation_error() {
        let err = classify_service_error(
            Some("ValidationError"),
            Some("1 validation error detected: Value '50000' at 'durationSeconds' failed; The requested DurationSeconds exceeds the MaxSessionDuration set for this role."),
            50000,
        );
        assert!(matches!(err, AssumeError::DurationExceeded { requested: 50000, .. }));
    }

    #[test]
    fn test_classify_other_errors() {
        let err = classify_service_error(Some("ValidationError"), Some("Invalid SAML"), 3600);
        assert!(matches!(err, AssumeError::Api { ref code, .. } if code == "ValidationError"));

        let err = classify_service_error(Some("ExpiredTokenException"), None, 3600);
        assert!(
            matches!(err, AssumeError::Api { ref code, ref message } if code == "ExpiredTokenException" && message.is_empty())
        );

        let err = classify_service_error(None, Some("boom"), 3600);
        assert!(matches!(err, AssumeError::Api { ref code, .. } if code == "Unknown"));
    }

    #[test]
    fn test_effective_duration() {
        assert_eq!(effective_duration(None, Some(7200)), 7200);
        assert_eq!(effective_duration(Some(10800), None), 10800);
        assert_eq!(effective_duration(None, None), 3600);
        assert_eq!(effective_duration(Some(43200), Some(7200)), 7200);
        assert_eq!(effective_duration(Some(1800), Some(7200)), 1800);
    }
}
