use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::{BookingDraft, InsuranceDetails};

pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsuranceError {
    #[error("Insurance is not enabled for this booking")]
    NotEnabled,

    #[error("{0} is required to verify insurance")]
    Incomplete(&'static str),

    #[error("Insurance could not be verified: {0}")]
    Rejected(String),
}

/// Checks insurance details with whoever underwrites them
#[async_trait]
pub trait InsuranceVerifier: Send + Sync {
    async fn verify(&self, details: &InsuranceDetails) -> Result<(), InsuranceError>;
}

/// Stand-in verifier: waits a fixed delay and accepts every policy
pub struct SimulatedVerifier {
    delay: Duration,
}

impl SimulatedVerifier {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_DELAY)
    }
}

#[async_trait]
impl InsuranceVerifier for SimulatedVerifier {
    async fn verify(&self, details: &InsuranceDetails) -> Result<(), InsuranceError> {
        tokio::time::sleep(self.delay).await;
        info!(provider = %details.provider, "insurance verified (simulated)");
        Ok(())
    }
}

/// Turn insurance on or off. Both directions start from a blank, unverified
/// record; turning it off drops the record altogether.
pub fn set_insurance_enabled(draft: &mut BookingDraft, enabled: bool) {
    draft.use_insurance = enabled;
    draft.insurance = enabled.then(InsuranceDetails::default);
}

/// Replace the insurance fields. Any edit invalidates a previous verification.
pub fn update_insurance(
    draft: &mut BookingDraft,
    mut details: InsuranceDetails,
) -> Result<(), InsuranceError> {
    if !draft.use_insurance {
        return Err(InsuranceError::NotEnabled);
    }
    details.verified = false;
    draft.insurance = Some(details);
    Ok(())
}

pub fn missing_insurance_field(details: &InsuranceDetails) -> Option<&'static str> {
    [
        ("Insurance provider", &details.provider),
        ("Policy number", &details.policy_number),
        ("Member ID", &details.member_id),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty())
    .map(|(label, _)| label)
}

/// Verify the draft's insurance and record the result on it.
pub async fn verify_insurance(
    draft: &mut BookingDraft,
    verifier: &dyn InsuranceVerifier,
) -> Result<(), InsuranceError> {
    if !draft.use_insurance {
        return Err(InsuranceError::NotEnabled);
    }
    let details = draft.insurance.get_or_insert_with(InsuranceDetails::default);
    if let Some(field) = missing_insurance_field(details) {
        return Err(InsuranceError::Incomplete(field));
    }

    verifier.verify(details).await?;
    details.verified = true;
    Ok(())
}
