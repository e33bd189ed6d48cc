//! Spreadsheet attachment for the final CRM payload.
//!
//! [`CsvWorkbookExporter`] renders each wizard section as a titled
//! semicolon-separated block in one CSV file, which spreadsheet tools open
//! directly.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use onboard_core::model::{BreakRule, WizardState, DAYS_PER_WEEK};
use onboard_core::submission::ExcelAttachment;
use onboard_core::types::Timestamp;

use crate::error::CollaboratorError;

const CSV_MIME: &str = "text/csv";
const SEPARATOR: char = ';';
const DAY_NAMES: [&str; DAYS_PER_WEEK] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

pub trait SpreadsheetExporter: Send + Sync {
    fn export(&self, state: &WizardState, now: Timestamp)
        -> Result<ExcelAttachment, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWorkbookExporter;

fn escape(cell: &str) -> String {
    if cell.contains([SEPARATOR, '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S]) {
    let row: Vec<String> = cells.iter().map(|c| escape(c.as_ref())).collect();
    out.push_str(&row.join(&SEPARATOR.to_string()));
    out.push_str("\r\n");
}

fn section(out: &mut String, title: &str, header: &[&str]) {
    if !out.is_empty() {
        out.push_str("\r\n");
    }
    push_row(out, &[title]);
    push_row(out, header);
}

fn break_label(rule: &BreakRule) -> String {
    match rule {
        BreakRule::NoBreak => "Sin colación".to_string(),
        BreakRule::Floating { minutos } => format!("{minutos} min libre"),
        BreakRule::Fixed { inicio, fin } => format!("{inicio}-{fin}"),
    }
}

/// File-name friendly form of the company name.
fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "empresa".to_string()
    } else {
        slug
    }
}

/// Render the whole state as CSV text.
pub fn render_csv(state: &WizardState) -> String {
    let mut out = String::new();
    let company = &state.company;

    section(&mut out, "Empresa", &["Campo", "Valor"]);
    for (label, value) in [
        ("Razón social", company.razon_social.as_str()),
        ("Nombre de fantasía", company.nombre_fantasia.as_str()),
        ("RUT", company.rut.as_str()),
        ("Giro", company.giro.as_str()),
        ("Dirección", company.direccion.as_str()),
        ("Comuna", company.comuna.as_str()),
        ("Email de facturación", company.email_facturacion.as_str()),
        ("Teléfono de contacto", company.telefono_contacto.as_str()),
        ("Rubro", company.rubro.as_str()),
    ] {
        push_row(&mut out, &[label, value]);
    }
    push_row(
        &mut out,
        &["Sistema de marcaje".to_string(), company.sistema_marcaje.join(", ")],
    );

    let group_name = |id: &Option<String>| {
        id.as_deref()
            .and_then(|id| company.grupos.iter().find(|g| g.id == id))
            .map(|g| g.nombre.clone())
            .unwrap_or_default()
    };

    section(&mut out, "Grupos", &["Nombre", "Descripción"]);
    for group in &company.grupos {
        push_row(&mut out, &[&group.nombre, &group.descripcion]);
    }

    section(
        &mut out,
        "Administradores",
        &["Nombre", "Apellido", "RUT", "Email", "Teléfono", "Grupo"],
    );
    for admin in &state.admins {
        push_row(
            &mut out,
            &[
                admin.nombre.clone(),
                admin.apellido.clone(),
                admin.rut.clone(),
                admin.email.clone(),
                admin.telefono.clone(),
                group_name(&admin.grupo_id),
            ],
        );
    }

    section(
        &mut out,
        "Trabajadores",
        &["Nombre", "RUT", "Email", "Grupo", "Teléfono 1", "Teléfono 2", "Teléfono 3"],
    );
    for worker in &state.workers {
        push_row(
            &mut out,
            &[
                worker.nombre.clone(),
                worker.rut.clone(),
                worker.email.clone(),
                group_name(&worker.grupo_id),
                worker.telefono1.clone(),
                worker.telefono2.clone(),
                worker.telefono3.clone(),
            ],
        );
    }

    section(&mut out, "Turnos", &["Nombre", "Inicio", "Término", "Colación", "Nota"]);
    for shift in state.custom_shifts() {
        push_row(
            &mut out,
            &[
                shift.nombre.clone(),
                shift.hora_inicio.clone(),
                shift.hora_fin.clone(),
                break_label(&shift.colacion),
                shift.nota.clone(),
            ],
        );
    }

    let shift_name = |id: &Option<String>| {
        id.as_deref()
            .and_then(|id| state.shifts.iter().find(|s| s.id == id))
            .map(|s| s.nombre.clone())
            .unwrap_or_default()
    };

    let mut header = vec!["Nombre"];
    header.extend(DAY_NAMES);
    section(&mut out, "Planificaciones", &header);
    for pattern in &state.schedule_patterns {
        let mut row = vec![pattern.nombre.clone()];
        row.extend(pattern.dias.iter().map(shift_name));
        push_row(&mut out, &row);
    }

    section(
        &mut out,
        "Asignaciones",
        &["Trabajador", "RUT", "Planificación", "Desde", "Hasta"],
    );
    for assignment in state.assignments.iter().filter(|a| a.is_valid()) {
        let worker = state.workers.iter().find(|w| w.id == assignment.trabajador_id);
        let pattern = state
            .schedule_patterns
            .iter()
            .find(|p| p.id == assignment.planificacion_id);
        push_row(
            &mut out,
            &[
                worker.map(|w| w.nombre.clone()).unwrap_or_default(),
                worker.map(|w| w.rut.clone()).unwrap_or_default(),
                pattern.map(|p| p.nombre.clone()).unwrap_or_default(),
                assignment.fecha_inicio.clone(),
                if assignment.is_permanent() {
                    "Permanente".to_string()
                } else {
                    assignment.fecha_fin.clone()
                },
            ],
        );
    }

    out
}

impl SpreadsheetExporter for CsvWorkbookExporter {
    fn export(
        &self,
        state: &WizardState,
        now: Timestamp,
    ) -> Result<ExcelAttachment, CollaboratorError> {
        if state.company.razon_social.trim().is_empty() {
            return Err(CollaboratorError::Export(
                "company legal name is required".to_string(),
            ));
        }
        let csv = render_csv(state);
        // UTF-8 BOM so spreadsheet tools pick the right encoding.
        let bytes = [&[0xEF, 0xBB, 0xBF][..], csv.as_bytes()].concat();
        Ok(ExcelAttachment {
            filename: format!(
                "onboarding_{}_{}.csv",
                slug(&state.company.razon_social),
                now.format("%Y%m%d")
            ),
            base64: B64.encode(bytes),
            mime_type: CSV_MIME.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use onboard_core::model::{Assignment, SchedulePattern, Shift, Worker};

    fn state() -> WizardState {
        let mut state = WizardState::default();
        state.company.razon_social = "Andes; Servicios SpA".into();
        state.shifts.push(Shift {
            id: "t1".into(),
            nombre: "Mañana".into(),
            hora_inicio: "08:00".into(),
            hora_fin: "17:00".into(),
            colacion: BreakRule::Floating { minutos: 45 },
            nota: String::new(),
        });
        let mut dias: [Option<String>; DAYS_PER_WEEK] = Default::default();
        dias[0] = Some("t1".into());
        dias[6] = Some("descanso".into());
        state.schedule_patterns.push(SchedulePattern {
            id: "p1".into(),
            nombre: "Semana".into(),
            dias,
        });
        state.workers.push(Worker {
            id: "w1".into(),
            nombre: "Luis \"Lucho\" Rojas".into(),
            rut: "76.086.428-5".into(),
            ..Default::default()
        });
        state.assignments.push(Assignment {
            trabajador_id: "w1".into(),
            planificacion_id: "p1".into(),
            fecha_inicio: "2024-07-01".into(),
            fecha_fin: "permanente".into(),
        });
        state
    }

    #[test]
    fn csv_escapes_and_resolves_references() {
        let csv = render_csv(&state());
        assert!(csv.contains("Razón social;\"Andes; Servicios SpA\""));
        assert!(csv.contains("\"Luis \"\"Lucho\"\" Rojas\""));
        assert!(csv.contains("Mañana;08:00;17:00;45 min libre;"));
        assert!(csv.contains("Semana;Mañana;;;;;;Descanso"));
        assert!(csv.contains("Semana;2024-07-01;Permanente"));
    }

    #[test]
    fn export_names_and_encodes_file() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let file = CsvWorkbookExporter.export(&state(), now).unwrap();
        assert_eq!(file.filename, "onboarding_andes__servicios_spa_20240701.csv");
        assert_eq!(file.mime_type, "text/csv");
        let decoded = B64.decode(&file.base64).unwrap();
        assert_eq!(&decoded[..3], &[0xEF, 0xBB, 0xBF]);
    }

    #[test]
    fn export_requires_legal_name() {
        let now = Utc::now();
        assert!(CsvWorkbookExporter.export(&WizardState::default(), now).is_err());
    }
}
