//! Entry tokens.
//!
//! A session can be entered with a token from a CRM link. Numeric tokens
//! are CRM record ids and address the remote record store directly; any
//! other token is an encrypted prefill token.
//!
//! Both kinds map to a stable session key, so reopening the same link
//! lands on the same draft.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryToken {
    RecordId(String),
    Encrypted(String),
}

impl EntryToken {
    /// Classify a raw token. Blank input means no token.
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self::RecordId(token.to_string()))
        } else {
            Some(Self::Encrypted(token.to_string()))
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::RecordId(id) => Some(id),
            Self::Encrypted(_) => None,
        }
    }

    /// Session key for this token: the record id itself, or a digest of
    /// the encrypted token.
    pub fn session_key(&self) -> String {
        match self {
            Self::RecordId(id) => id.clone(),
            Self::Encrypted(token) => {
                let hash = Sha256::digest(token.as_bytes());
                format!("token-{}", &format!("{hash:x}")[..32])
            }
        }
    }
}
