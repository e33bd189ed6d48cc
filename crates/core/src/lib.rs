//! Pure domain logic for the company onboarding wizard.
//!
//! Nothing in this crate performs I/O. It provides:
//!
//! - [`model`]: the wizard form model and its catalogs.
//! - [`validation`]: per-step field validation rules.
//! - [`diff`]: structural diff over the JSON form of the state.
//! - [`provenance`]: prefilled vs. user-entered tracking per field.
//! - [`merge`]: the anti-overwrite merge of prefill, draft, and edits.
//! - [`roster`]: groups, bulk worker import, and admin-mirrored workers.
//! - [`onboarding_wizard`]: steps, transition table, and navigation.
//! - [`draft`]: the persisted snapshot and its compatibility rules.
//! - [`submission`]: CRM and record-store payload builders.

pub mod diff;
pub mod draft;
pub mod error;
pub mod merge;
pub mod model;
pub mod onboarding_wizard;
pub mod provenance;
pub mod roster;
pub mod submission;
pub mod types;
pub mod validation;
