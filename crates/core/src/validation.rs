//! Field validation rules for every data-entry step.
//!
//! All functions are pure. Error messages are user-facing (Spanish) and name
//! the offending field; the navigator turns them into a
//! [`ValidationFailure`](crate::onboarding_wizard::ValidationFailure).

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{Admin, BreakRule, Company, SchedulePattern, Shift, Worker, WizardState};

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static NATIONAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[\dK]$").expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

/// Cyclic checksum weights applied from the least significant body digit.
const CHECKSUM_WEIGHTS: [u32; 6] = [2, 3, 4, 5, 6, 7];

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Aggregated outcome of a section validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Human-readable summary messages.
    pub errors: Vec<String>,
    /// Field path -> message, for inline display.
    pub field_errors: BTreeMap<String, String>,
}

impl ValidationOutcome {
    fn from_parts(errors: Vec<String>, field_errors: BTreeMap<String, String>) -> Self {
        Self {
            is_valid: errors.is_empty() && field_errors.is_empty(),
            errors,
            field_errors,
        }
    }

    pub fn ok() -> Self {
        Self::from_parts(Vec::new(), BTreeMap::new())
    }
}

/// Per-field errors for a single worker row, keyed by field name.
pub type FieldErrors = BTreeMap<&'static str, String>;

// ---------------------------------------------------------------------------
// National id
// ---------------------------------------------------------------------------

/// Strip the conventional punctuation (`.` and `-`), surrounding whitespace,
/// and uppercase the verifier.
pub fn normalize_national_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '.' && *c != '-')
        .collect::<String>()
        .to_uppercase()
}

/// Compute the expected verifier character for a string of body digits.
fn expected_verifier(body: &str) -> Option<char> {
    let mut sum = 0u32;
    for (i, c) in body.chars().rev().enumerate() {
        let digit = c.to_digit(10)?;
        sum += digit * CHECKSUM_WEIGHTS[i % CHECKSUM_WEIGHTS.len()];
    }
    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        n => char::from_digit(n, 10),
    }
}

/// Validate a national tax id (`12.345.678-5`, `123456785`, `7.654.321-k`).
pub fn is_valid_national_id(raw: &str) -> bool {
    let normalized = normalize_national_id(raw);
    if normalized.is_empty() || !NATIONAL_ID_RE.is_match(&normalized) {
        return false;
    }
    let (body, verifier) = normalized.split_at(normalized.len() - 1);
    match (expected_verifier(body), verifier.chars().next()) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    }
}

/// Format a national id for display: thousands dots plus dash verifier.
///
/// Input that does not look like an id is returned trimmed but otherwise
/// untouched.
pub fn format_national_id(raw: &str) -> String {
    let normalized = normalize_national_id(raw);
    if !NATIONAL_ID_RE.is_match(&normalized) {
        return raw.trim().to_string();
    }
    let (body, verifier) = normalized.split_at(normalized.len() - 1);
    let mut grouped = Vec::new();
    let digits: Vec<char> = body.chars().collect();
    for chunk in digits.rchunks(3).rev() {
        grouped.push(chunk.iter().collect::<String>());
    }
    format!("{}-{verifier}", grouped.join("."))
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

pub fn is_valid_email(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && EMAIL_RE.is_match(trimmed)
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

/// Validate the company step. Every field from `razonSocial` through
/// `rubro` is required.
pub fn validate_company_fields(company: &Company) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut field_errors = BTreeMap::new();

    let required: [(&str, &str, &String); 9] = [
        ("company.razonSocial", "Razón social", &company.razon_social),
        ("company.nombreFantasia", "Nombre de fantasía", &company.nombre_fantasia),
        ("company.rut", "RUT de la empresa", &company.rut),
        ("company.giro", "Giro", &company.giro),
        ("company.direccion", "Dirección", &company.direccion),
        ("company.comuna", "Comuna", &company.comuna),
        ("company.emailFacturacion", "Email de facturación", &company.email_facturacion),
        ("company.telefonoContacto", "Teléfono de contacto", &company.telefono_contacto),
        ("company.rubro", "Rubro", &company.rubro),
    ];

    for (path, label, value) in required {
        if is_blank(value) {
            let msg = format!("{label} es obligatorio");
            field_errors.insert(path.to_string(), msg.clone());
            errors.push(msg);
        }
    }

    if !is_blank(&company.rut) && !is_valid_national_id(&company.rut) {
        let msg = "RUT de la empresa no es válido".to_string();
        field_errors.insert("company.rut".to_string(), msg.clone());
        errors.push(msg);
    }

    if !is_blank(&company.email_facturacion) && !is_valid_email(&company.email_facturacion) {
        let msg = "Email de facturación no es válido".to_string();
        field_errors.insert("company.emailFacturacion".to_string(), msg.clone());
        errors.push(msg);
    }

    if company.sistema_marcaje.iter().all(|s| is_blank(s)) {
        let msg = "Debe seleccionar al menos un sistema de marcaje".to_string();
        field_errors.insert("company.sistemaMarcaje".to_string(), msg.clone());
        errors.push(msg);
    }

    ValidationOutcome::from_parts(errors, field_errors)
}

// ---------------------------------------------------------------------------
// Admins
// ---------------------------------------------------------------------------

pub fn validate_admin_fields(admins: &[Admin]) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut field_errors = BTreeMap::new();

    if admins.is_empty() {
        errors.push("Debe agregar al menos un administrador".to_string());
        return ValidationOutcome::from_parts(errors, field_errors);
    }

    for (i, admin) in admins.iter().enumerate() {
        let n = i + 1;
        for (field, label, value) in [
            ("nombre", "nombre", &admin.nombre),
            ("email", "email", &admin.email),
            ("telefono", "teléfono", &admin.telefono),
        ] {
            if is_blank(value) {
                let msg = format!("Administrador {n}: {label} es obligatorio");
                field_errors.insert(format!("admins.{i}.{field}"), msg.clone());
                errors.push(msg);
            }
        }
        if !is_blank(&admin.email) && !is_valid_email(&admin.email) {
            let msg = format!("Administrador {n}: email no es válido");
            field_errors.insert(format!("admins.{i}.email"), msg.clone());
            errors.push(msg);
        }
    }

    ValidationOutcome::from_parts(errors, field_errors)
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Validate a single worker row.
pub fn validate_worker_row(worker: &Worker) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if is_blank(&worker.nombre) {
        errors.insert("nombre", "Nombre es obligatorio".to_string());
    }

    if is_blank(&worker.rut) {
        errors.insert("rut", "RUT es obligatorio".to_string());
    } else if !is_valid_national_id(&worker.rut) {
        errors.insert("rut", "RUT no es válido".to_string());
    }

    if !is_blank(&worker.email) && !is_valid_email(&worker.email) {
        errors.insert("email", "Email no es válido".to_string());
    }

    errors
}

/// Validate the worker table: every row plus duplicate ids among regular rows.
pub fn validate_workers(workers: &[Worker]) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut field_errors = BTreeMap::new();
    let mut seen = HashSet::new();

    for (i, worker) in workers.iter().enumerate() {
        for (field, msg) in validate_worker_row(worker) {
            field_errors.insert(format!("workers.{i}.{field}"), msg.clone());
            errors.push(format!("Trabajador {}: {msg}", i + 1));
        }

        if worker.is_admin_mirror() || is_blank(&worker.rut) {
            continue;
        }
        if !seen.insert(normalize_national_id(&worker.rut)) {
            let msg = "RUT duplicado".to_string();
            field_errors.insert(format!("workers.{i}.rut"), msg.clone());
            errors.push(format!("Trabajador {}: {msg}", i + 1));
        }
    }

    ValidationOutcome::from_parts(errors, field_errors)
}

// ---------------------------------------------------------------------------
// Shifts, schedules, assignments
// ---------------------------------------------------------------------------

/// A pattern is complete when every weekday slot holds a shift.
pub fn schedule_is_complete(pattern: &SchedulePattern) -> bool {
    pattern
        .dias
        .iter()
        .all(|slot| slot.as_deref().is_some_and(|id| !is_blank(id)))
}

pub fn validate_shifts(shifts: &[Shift]) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut field_errors = BTreeMap::new();

    let custom: Vec<(usize, &Shift)> = shifts
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_sentinel())
        .collect();

    if !custom.iter().any(|(_, s)| !is_blank(&s.nombre)) {
        errors.push("Debe crear al menos un turno con nombre".to_string());
    }

    for (i, shift) in custom {
        let label = if is_blank(&shift.nombre) {
            format!("Turno {}", i + 1)
        } else {
            shift.nombre.trim().to_string()
        };
        if is_blank(&shift.nombre) {
            let msg = format!("{label}: nombre es obligatorio");
            field_errors.insert(format!("shifts.{i}.nombre"), msg.clone());
            errors.push(msg);
        }
        if is_blank(&shift.hora_inicio) {
            let msg = format!("{label}: hora de inicio es obligatoria");
            field_errors.insert(format!("shifts.{i}.horaInicio"), msg.clone());
            errors.push(msg);
        }
        if is_blank(&shift.hora_fin) {
            let msg = format!("{label}: hora de término es obligatoria");
            field_errors.insert(format!("shifts.{i}.horaFin"), msg.clone());
            errors.push(msg);
        }
        if let BreakRule::Fixed { inicio, fin } = &shift.colacion {
            if is_blank(inicio) || is_blank(fin) {
                let msg = format!("{label}: la colación fija requiere inicio y término");
                field_errors.insert(format!("shifts.{i}.colacion"), msg.clone());
                errors.push(msg);
            }
        }
    }

    ValidationOutcome::from_parts(errors, field_errors)
}

/// Require at least one named pattern. Completeness is advisory only.
pub fn validate_schedules(patterns: &[SchedulePattern]) -> ValidationOutcome {
    let mut errors = Vec::new();
    let mut field_errors = BTreeMap::new();

    if patterns.is_empty() {
        errors.push("Debe crear al menos una planificación".to_string());
    }

    for (i, pattern) in patterns.iter().enumerate() {
        if is_blank(&pattern.nombre) {
            let msg = format!("Planificación {}: nombre es obligatorio", i + 1);
            field_errors.insert(format!("schedulePatterns.{i}.nombre"), msg.clone());
            errors.push(msg);
        }
    }

    ValidationOutcome::from_parts(errors, field_errors)
}

pub fn validate_assignments(state: &WizardState) -> ValidationOutcome {
    let mut errors = Vec::new();
    if !state.has_valid_assignments() {
        errors.push("Debe asignar al menos un trabajador a una planificación".to_string());
    }
    ValidationOutcome::from_parts(errors, BTreeMap::new())
}

/// Human-readable list of incomplete patterns, shown as a non-blocking hint.
pub fn incomplete_schedule_warnings(patterns: &[SchedulePattern]) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| !schedule_is_complete(p))
        .map(|p| format!("La planificación '{}' tiene días sin turno", p.nombre.trim()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
