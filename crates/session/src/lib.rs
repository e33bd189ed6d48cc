//! Onboarding sessions.
//!
//! [`WizardSession`] wires the pure wizard logic of `onboard_core` to the
//! draft store of `onboard_db` and the external collaborators of
//! `onboard_events`. [`SessionRegistry`] keeps the live sessions of a
//! process and serializes operations per session.

pub mod context;
pub mod error;
pub mod registry;
pub mod session;
pub mod token;

pub use context::{Collaborators, SessionSettings};
pub use error::SessionError;
pub use registry::{SessionRegistry, SharedSession};
pub use session::{
    DeliveredSubmission, OpenRequest, PendingSubmission, SessionView, WizardSession,
};
pub use token::EntryToken;
