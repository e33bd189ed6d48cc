use onboard_core::error::CoreError;
use onboard_core::onboarding_wizard::{NavigationError, OnboardingStep};
use onboard_db::DraftStoreError;
use onboard_events::CollaboratorError;

/// Failure of a session operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Step validation or an illegal move. The session is unchanged.
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Draft(#[from] DraftStoreError),

    #[error("Step {0} does not take a decision")]
    NotADecisionStep(OnboardingStep),

    /// Another submission of the same session has not finished yet.
    #[error("A submission is already in progress for this session")]
    SubmissionInFlight,

    /// The CRM did not accept the final payload. State is kept and the
    /// submission may be retried.
    #[error("Submission failed: {0}")]
    Submission(#[source] CollaboratorError),

    #[error("Session {0} not found")]
    NotFound(String),
}
