/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Dot-notation path into the JSON form of the wizard state
/// (e.g. `company.razonSocial`, `workers.2.rut`).
pub type FieldPath = String;

/// Generate a fresh opaque identifier for groups, shifts, and patterns.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
