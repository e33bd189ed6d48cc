//! Wizard data model.
//!
//! JSON field names are camelCase and follow the CRM form vocabulary
//! (`razonSocial`, `trabajadores`, ...). Every struct is `#[serde(default)]`
//! so partially populated prefill records and salvaged drafts deserialize
//! without error.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

/// Accepted values for the marking-system selection.
pub const MARKING_SYSTEMS: &[&str] = &[
    "reloj_biometrico",
    "app_movil",
    "tarjeta_proximidad",
    "web",
    "codigo_qr",
];

/// Accepted industry categories.
pub const INDUSTRY_CATEGORIES: &[&str] = &[
    "Agrícola",
    "Comercio",
    "Construcción",
    "Educación",
    "Financiero",
    "Manufactura",
    "Minería",
    "Salud",
    "Servicios",
    "Tecnología",
    "Transporte",
    "Otro",
];

/// Id of the seeded "rest day" shift.
pub const REST_DAY_SHIFT_ID: &str = "descanso";

/// Id of the seeded "unscheduled" shift.
pub const UNSCHEDULED_SHIFT_ID: &str = "sin_turno";

/// End-date sentinel for assignments with no end.
pub const PERMANENT_END: &str = "permanente";

/// Number of day slots in a schedule pattern (Monday..Sunday).
pub const DAYS_PER_WEEK: usize = 7;

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Group {
    pub id: String,
    pub nombre: String,
    pub descripcion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
    pub razon_social: String,
    pub nombre_fantasia: String,
    /// National tax id as typed by the user; see
    /// [`normalize_national_id`](crate::validation::normalize_national_id).
    pub rut: String,
    pub giro: String,
    pub direccion: String,
    pub comuna: String,
    pub email_facturacion: String,
    pub telefono_contacto: String,
    /// Selected marking systems. Treated as a set; order is display order.
    pub sistema_marcaje: Vec<String>,
    pub rubro: String,
    pub grupos: Vec<Group>,
}

// ---------------------------------------------------------------------------
// People
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Admin {
    pub nombre: String,
    pub apellido: String,
    pub rut: String,
    pub email: String,
    pub telefono: String,
    pub grupo_id: Option<String>,
}

impl Admin {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nombre.trim(), self.apellido.trim())
            .trim()
            .to_string()
    }
}

/// Whether a worker row was entered by the user or derived from an admin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerKind {
    #[default]
    Regular,
    AdminMirrored,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Worker {
    pub id: String,
    pub nombre: String,
    pub rut: String,
    pub email: String,
    pub grupo_id: Option<String>,
    pub telefono1: String,
    pub telefono2: String,
    pub telefono3: String,
    pub kind: WorkerKind,
}

impl Worker {
    pub fn is_admin_mirror(&self) -> bool {
        self.kind == WorkerKind::AdminMirrored
    }
}

// ---------------------------------------------------------------------------
// Shifts and schedules
// ---------------------------------------------------------------------------

/// Break configuration for a shift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum BreakRule {
    #[default]
    NoBreak,
    /// A break of fixed length taken at any time during the shift.
    Floating { minutos: u32 },
    /// A break at a fixed time window.
    Fixed { inicio: String, fin: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Shift {
    pub id: String,
    pub nombre: String,
    pub hora_inicio: String,
    pub hora_fin: String,
    pub colacion: BreakRule,
    pub nota: String,
}

impl Shift {
    /// The two shifts every wizard starts with.
    pub fn sentinels() -> Vec<Shift> {
        vec![
            Shift {
                id: REST_DAY_SHIFT_ID.to_string(),
                nombre: "Descanso".to_string(),
                ..Default::default()
            },
            Shift {
                id: UNSCHEDULED_SHIFT_ID.to_string(),
                nombre: "Sin turno".to_string(),
                ..Default::default()
            },
        ]
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == REST_DAY_SHIFT_ID || self.id == UNSCHEDULED_SHIFT_ID
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulePattern {
    pub id: String,
    pub nombre: String,
    /// Shift id per weekday, Monday first. `None` means unassigned.
    pub dias: [Option<String>; DAYS_PER_WEEK],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Assignment {
    pub trabajador_id: String,
    pub planificacion_id: String,
    pub fecha_inicio: String,
    /// End date, or [`PERMANENT_END`].
    pub fecha_fin: String,
}

impl Assignment {
    /// An assignment is valid when all four references are populated.
    pub fn is_valid(&self) -> bool {
        [
            &self.trabajador_id,
            &self.planificacion_id,
            &self.fecha_inicio,
            &self.fecha_fin,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }

    pub fn is_permanent(&self) -> bool {
        self.fecha_fin == PERMANENT_END
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

/// The complete wizard form model, persisted as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardState {
    pub company: Company,
    pub admins: Vec<Admin>,
    pub workers: Vec<Worker>,
    pub shifts: Vec<Shift>,
    pub schedule_patterns: Vec<SchedulePattern>,
    pub assignments: Vec<Assignment>,
    /// Decision recorded at the configure-shifts step. `None` until chosen.
    pub configure_shifts_now: Option<bool>,
    /// Decision recorded at the load-workers step. `None` until chosen.
    pub load_workers_now: Option<bool>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            company: Company::default(),
            admins: Vec::new(),
            workers: Vec::new(),
            shifts: Shift::sentinels(),
            schedule_patterns: Vec::new(),
            assignments: Vec::new(),
            configure_shifts_now: None,
            load_workers_now: None,
        }
    }
}

impl WizardState {
    pub fn regular_workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.iter().filter(|w| !w.is_admin_mirror())
    }

    pub fn custom_shifts(&self) -> impl Iterator<Item = &Shift> {
        self.shifts.iter().filter(|s| !s.is_sentinel())
    }

    pub fn has_valid_assignments(&self) -> bool {
        self.assignments.iter().any(Assignment::is_valid)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, crate::error::CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, crate::error::CoreError> {
        Ok(serde_json::from_value(value)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
