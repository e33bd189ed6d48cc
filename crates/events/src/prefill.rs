//! Prefill token resolution.
//!
//! An encrypted entry token is exchanged at `{base}/decrypt-token` for the
//! CRM's company record, which is then shaped into a prefill seed (the JSON
//! form of a partial wizard state).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::CollaboratorError;

const DECRYPT_PATH: &str = "decrypt-token";

/// Company fields copied from a flat CRM record into the seed.
const COMPANY_FIELDS: &[&str] = &[
    "razonSocial",
    "nombreFantasia",
    "rut",
    "giro",
    "direccion",
    "comuna",
    "emailFacturacion",
    "telefonoContacto",
    "sistemaMarcaje",
    "rubro",
    "grupos",
];

/// Top-level sections accepted verbatim from a record already in form shape.
const SECTION_FIELDS: &[&str] = &[
    "company",
    "admins",
    "workers",
    "shifts",
    "schedulePatterns",
    "assignments",
];

#[async_trait]
pub trait PrefillResolver: Send + Sync {
    /// Resolve a token to a prefill seed. `Ok(None)` when the token is
    /// rejected or the record is empty.
    async fn resolve(&self, token: &str) -> Result<Option<Value>, CollaboratorError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptReply {
    success: bool,
    #[serde(default)]
    empresa_data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpPrefillResolver {
    client: reqwest::Client,
    url: String,
}

impl HttpPrefillResolver {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: crate::endpoint(base_url, DECRYPT_PATH),
        }
    }
}

#[async_trait]
impl PrefillResolver for HttpPrefillResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Value>, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "token": token }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::HttpStatus(response.status().as_u16()));
        }

        let reply: DecryptReply = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        if !reply.success {
            tracing::warn!(error = ?reply.error, "Prefill token rejected");
            return Ok(None);
        }
        Ok(reply.empresa_data.as_ref().and_then(seed_from_record))
    }
}

/// Multi-valued CRM fields sometimes arrive as `"a;b"` strings.
fn split_list(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::Array(
            s.split([';', ','])
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Value::String(p.to_string()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Shape a CRM company record into a prefill seed.
///
/// A record that already has form sections (`company`, `admins`, ...) is
/// taken section by section; a flat record is read as company fields.
/// Returns `None` when nothing usable remains.
pub fn seed_from_record(record: &Value) -> Option<Value> {
    let obj = record.as_object()?;
    let mut seed = Map::new();

    if SECTION_FIELDS.iter().any(|k| obj.contains_key(*k)) {
        for key in SECTION_FIELDS {
            if let Some(value) = obj.get(*key) {
                seed.insert((*key).to_string(), value.clone());
            }
        }
    } else {
        let mut company = Map::new();
        for key in COMPANY_FIELDS {
            if let Some(value) = obj.get(*key).filter(|v| !v.is_null()) {
                company.insert((*key).to_string(), value.clone());
            }
        }
        if !company.is_empty() {
            seed.insert("company".to_string(), Value::Object(company));
        }
    }

    if let Some(Value::Object(company)) = seed.get_mut("company") {
        if let Some(marking) = company.get("sistemaMarcaje").map(split_list) {
            company.insert("sistemaMarcaje".to_string(), marking);
        }
    }

    (!seed.is_empty()).then_some(Value::Object(seed))
}
