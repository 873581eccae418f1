//! Second-factor verification.
//!
//! Drives an [`AuthResult`] to a session token: factor choice, push polling
//! with a bounded budget, and one-time codes. Push polling that runs out of
//! budget falls back to asking for a code instead of failing.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::{MAX_SELECTION_ATTEMPTS, PUSH_POLL_INTERVAL, PUSH_TIMEOUT};
use crate::error::MfaError;
use crate::idp::{AuthResult, FactorKind, IdentityProvider, MfaFactor, VerifyResult};
use crate::prompt::Interaction;

#[derive(Debug)]
enum MfaState {
    NotStarted(AuthResult),
    AwaitingFactorChoice {
        state_token: String,
        factors: Vec<MfaFactor>,
    },
    AwaitingPush {
        state_token: String,
        factor: MfaFactor,
        /// Other enrolled factors, the fallback candidates
        others: Vec<MfaFactor>,
    },
    AwaitingOtp {
        state_token: String,
        factor: MfaFactor,
    },
    Verified(String),
    Failed(MfaError),
}

#[derive(Debug, Clone)]
pub struct MfaVerifier {
    pub poll_interval: Duration,
    pub push_timeout: Duration,
    /// Factor id, type (push/totp/sms) or vendor to pick without asking
    pub preferred_factor: Option<String>,
}

impl Default for MfaVerifier {
    fn default() -> Self {
        Self {
            poll_interval: PUSH_POLL_INTERVAL,
            push_timeout: PUSH_TIMEOUT,
            preferred_factor: None,
        }
    }
}

impl MfaVerifier {
    pub fn with_preferred_factor(mut self, preferred: Option<String>) -> Self {
        self.preferred_factor = preferred;
        self
    }

    /// Upper bound on push verification calls
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let polls = self.push_timeout.as_millis() / interval;
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }

    /// Run the verification state machine until it yields a session token
    pub async fn verify(
        &self,
        provider: &dyn IdentityProvider,
        auth: AuthResult,
        interaction: &dyn Interaction,
    ) -> Result<String, MfaError> {
        let mut state = MfaState::NotStarted(auth);

        loop {
            state = match state {
                MfaState::NotStarted(AuthResult::Success(token)) => MfaState::Verified(token),
                MfaState::NotStarted(AuthResult::MfaRequired {
                    state_token,
                    factors,
                }) => MfaState::AwaitingFactorChoice {
                    state_token,
                    factors,
                },
                MfaState::AwaitingFactorChoice {
                    state_token,
                    factors,
                } => match self.choose_factor(factors, interaction) {
                    Ok((factor, others)) => {
                        self.begin(provider, state_token, factor, others).await
                    }
                    Err(e) => MfaState::Failed(e),
                },
                MfaState::AwaitingPush {
                    state_token,
                    factor,
                    others,
                } => self.poll_push(provider, state_token, factor, others).await,
                MfaState::AwaitingOtp {
                    state_token,
                    factor,
                } => verify_otp(provider, state_token, factor, interaction).await,
                MfaState::Verified(token) => return Ok(token),
                MfaState::Failed(e) => return Err(e),
            };
        }
    }

    /// Pick a factor, returning it with the remaining ones in their original order
    fn choose_factor(
        &self,
        mut factors: Vec<MfaFactor>,
        interaction: &dyn Interaction,
    ) -> Result<(MfaFactor, Vec<MfaFactor>), MfaError> {
        if factors.is_empty() {
            return Err(MfaError::NoFactors);
        }
        if factors.len() == 1 {
            return Ok((factors.remove(0), factors));
        }

        if let Some(preferred) = self.preferred_factor.as_deref() {
            if let Some(index) = factors.iter().position(|f| factor_matches(f, preferred)) {
                debug!("Using preferred MFA factor {}", factors[index]);
                let factor = factors.remove(index);
                return Ok((factor, factors));
            }
            warn!("Preferred MFA factor '{}' is not enrolled", preferred);
        }

        for _ in 0..MAX_SELECTION_ATTEMPTS {
            let index = interaction
                .select_factor(&factors)
                .map_err(MfaError::Prompt)?;
            if index < factors.len() {
                let factor = factors.remove(index);
                return Ok((factor, factors));
            }
            warn!("MFA factor selection {} is out of range", index);
        }
        Err(MfaError::Selection {
            attempts: MAX_SELECTION_ATTEMPTS,
        })
    }

    async fn begin(
        &self,
        provider: &dyn IdentityProvider,
        state_token: String,
        factor: MfaFactor,
        others: Vec<MfaFactor>,
    ) -> MfaState {
        match factor.kind {
            FactorKind::Push => MfaState::AwaitingPush {
                state_token,
                factor,
                others,
            },
            FactorKind::Sms => {
                // The first call without a code makes the IdP send the SMS.
                match provider.verify_factor(&state_token, &factor, None).await {
                    Ok(VerifyResult::Success(token)) => MfaState::Verified(token),
                    Ok(VerifyResult::Pending) => MfaState::AwaitingOtp {
                        state_token,
                        factor,
                    },
                    Err(e) => MfaState::Failed(e.into()),
                }
            }
            _ => MfaState::AwaitingOtp {
                state_token,
                factor,
            },
        }
    }

    async fn poll_push(
        &self,
        provider: &dyn IdentityProvider,
        state_token: String,
        factor: MfaFactor,
        mut others: Vec<MfaFactor>,
    ) -> MfaState {
        let max_polls = self.max_polls();
        info!("Waiting for push approval on {}", factor);

        for attempt in 1..=max_polls {
            match provider.verify_factor(&state_token, &factor, None).await {
                Ok(VerifyResult::Success(token)) => return MfaState::Verified(token),
                Ok(VerifyResult::Pending) => {
                    debug!("Push pending ({}/{})", attempt, max_polls);
                    if attempt < max_polls {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                Err(e) => return MfaState::Failed(e.into()),
            }
        }

        warn!(
            "Push was not approved within {}s, falling back to a verification code",
            self.push_timeout.as_secs()
        );

        // Okta push endpoints ignore passcodes; prefer an enrolled code factor.
        let code_factor = [FactorKind::Totp, FactorKind::Sms]
            .iter()
            .find_map(|kind| others.iter().position(|f| &f.kind == kind));
        match code_factor {
            Some(index) => {
                let fallback = others.remove(index);
                debug!("Verification code fallback uses {}", fallback);
                self.begin(provider, state_token, fallback, Vec::new()).await
            }
            // OneLogin Protect accepts a code on the push device itself
            None => MfaState::AwaitingOtp {
                state_token,
                factor,
            },
        }
    }
}

async fn verify_otp(
    provider: &dyn IdentityProvider,
    state_token: String,
    factor: MfaFactor,
    interaction: &dyn Interaction,
) -> MfaState {
    let otp = match interaction.read_otp(&factor) {
        Ok(otp) => otp,
        Err(e) => return MfaState::Failed(MfaError::Prompt(e)),
    };

    match provider
        .verify_factor(&state_token, &factor, Some(&otp))
        .await
    {
        Ok(VerifyResult::Success(token)) => MfaState::Verified(token),
        Ok(VerifyResult::Pending) => MfaState::Failed(MfaError::NotVerified {
            factor: factor.to_string(),
        }),
        Err(e) => MfaState::Failed(e.into()),
    }
}

fn factor_matches(factor: &MfaFactor, preferred: &str) -> bool {
    factor.id == preferred
        || factor.kind.as_str().eq_ignore_ascii_case(preferred)
        || factor.provider.eq_ignore_ascii_case(preferred)
}
