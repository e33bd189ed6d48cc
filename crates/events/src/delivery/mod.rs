//! Delivery channels that push onboarding data out to the CRM.

pub mod webhook;
