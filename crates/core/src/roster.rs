//! Roster helpers: groups, bulk worker import, admin-mirrored workers, and
//! the assignment selection filter.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Admin, Assignment, Group, Worker, WorkerKind, WizardState};
use crate::types::new_id;
use crate::validation::{normalize_national_id, validate_worker_row};

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn group_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Find a group by name (trimmed, case-insensitive) or append a new one.
///
/// Returns the (possibly extended) group list and the id to reference.
pub fn ensure_group_by_name(groups: &[Group], name: &str) -> (Vec<Group>, String) {
    let key = group_key(name);
    if let Some(existing) = groups.iter().find(|g| group_key(&g.nombre) == key) {
        return (groups.to_vec(), existing.id.clone());
    }

    let id = new_id();
    let mut updated = groups.to_vec();
    updated.push(Group {
        id: id.clone(),
        nombre: name.trim().to_string(),
        descripcion: String::new(),
    });
    (updated, id)
}

/// The roster list a group is typed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSection {
    Admins,
    Workers,
}

/// Set the group of one admin or worker from the free-text group field.
///
/// The name goes through [`ensure_group_by_name`], the same lookup the bulk
/// importer uses. A blank name clears the group. Admin-mirrored worker rows
/// take their group from the admin and are refused here.
pub fn assign_group_by_name(
    state: &mut WizardState,
    section: RosterSection,
    index: usize,
    name: &str,
) -> Result<Option<String>, CoreError> {
    let resolved = if group_key(name).is_empty() {
        None
    } else {
        Some(ensure_group_by_name(&state.company.grupos, name))
    };

    let slot = match section {
        RosterSection::Admins => state
            .admins
            .get_mut(index)
            .map(|a| &mut a.grupo_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Admin",
                key: index.to_string(),
            })?,
        RosterSection::Workers => match state.workers.get_mut(index) {
            None => {
                return Err(CoreError::NotFound {
                    entity: "Worker",
                    key: index.to_string(),
                })
            }
            Some(w) if w.is_admin_mirror() => {
                return Err(CoreError::Conflict(
                    "El grupo de un administrador se edita en su ficha".to_string(),
                ))
            }
            Some(w) => &mut w.grupo_id,
        },
    };

    match resolved {
        Some((groups, id)) => {
            *slot = Some(id.clone());
            state.company.grupos = groups;
            Ok(Some(id))
        }
        None => {
            *slot = None;
            Ok(None)
        }
    }
}

/// Resolves group names to ids for the duration of one batch, so that rows
/// naming the same group in different casing converge to a single id.
pub struct GroupResolver {
    groups: Vec<Group>,
    cache: HashMap<String, String>,
}

impl GroupResolver {
    pub fn new(groups: &[Group]) -> Self {
        Self {
            groups: groups.to_vec(),
            cache: HashMap::new(),
        }
    }

    /// Resolve a name to a group id. Blank names resolve to `None`.
    pub fn resolve(&mut self, name: &str) -> Option<String> {
        let key = group_key(name);
        if key.is_empty() {
            return None;
        }
        if let Some(id) = self.cache.get(&key) {
            return Some(id.clone());
        }
        let (groups, id) = ensure_group_by_name(&self.groups, name);
        self.groups = groups;
        self.cache.insert(key, id.clone());
        Some(id)
    }

    pub fn into_groups(self) -> Vec<Group> {
        self.groups
    }
}

// ---------------------------------------------------------------------------
// Bulk import
// ---------------------------------------------------------------------------

/// A pasted row that could not be imported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// 1-based line number in the pasted text.
    pub line: usize,
    pub content: String,
    pub reasons: Vec<String>,
}

/// Outcome of parsing a pasted worker table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImport {
    pub workers: Vec<Worker>,
    pub groups: Vec<Group>,
    pub rejected: Vec<RejectedRow>,
}

const HEADER_MARKERS: &[&str] = &["nombre", "name", "rut"];

fn split_row(line: &str) -> Vec<String> {
    let separator = if line.contains('\t') { '\t' } else { ';' };
    line.split(separator).map(|c| c.trim().to_string()).collect()
}

fn is_header(cells: &[String]) -> bool {
    cells
        .first()
        .is_some_and(|c| HEADER_MARKERS.contains(&c.to_lowercase().as_str()))
}

/// Parse spreadsheet text pasted into the worker step.
///
/// Columns: nombre, rut, email, grupo, teléfono 1..3. Tab-separated (a
/// spreadsheet copy) or semicolon-separated. A leading header row and
/// blank lines are skipped. Rows with an invalid name or id are rejected
/// with reasons; their group is never created.
pub fn parse_bulk_workers(text: &str, groups: &[Group]) -> BulkImport {
    let mut resolver = GroupResolver::new(groups);
    let mut workers = Vec::new();
    let mut rejected = Vec::new();

    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_row(line);
        if i == 0 && is_header(&cells) {
            continue;
        }

        let cell = |idx: usize| cells.get(idx).cloned().unwrap_or_default();
        let mut worker = Worker {
            id: new_id(),
            nombre: cell(0),
            rut: cell(1),
            email: cell(2),
            grupo_id: None,
            telefono1: cell(4),
            telefono2: cell(5),
            telefono3: cell(6),
            kind: WorkerKind::Regular,
        };

        let errors = validate_worker_row(&worker);
        if !errors.is_empty() {
            rejected.push(RejectedRow {
                line: i + 1,
                content: line.to_string(),
                reasons: errors.into_values().collect(),
            });
            continue;
        }

        worker.grupo_id = resolver.resolve(&cell(3));
        workers.push(worker);
    }

    BulkImport {
        workers,
        groups: resolver.into_groups(),
        rejected,
    }
}

// ---------------------------------------------------------------------------
// Admin-mirrored workers
// ---------------------------------------------------------------------------

/// Stable worker id for the mirror of an admin, so assignments survive
/// regeneration.
pub fn mirror_worker_id(admin: &Admin) -> String {
    format!("admin-{}", normalize_national_id(&admin.rut).to_lowercase())
}

/// Regenerate admin-mirrored workers from the admin list.
///
/// Existing mirrors are dropped and re-derived, one per admin with an id.
/// Admins already present as a regular worker (same normalized id) are not
/// mirrored again. Mirrors come first, followed by regular workers in their
/// original order.
pub fn sync_admin_mirrors(admins: &[Admin], workers: &[Worker]) -> Vec<Worker> {
    let regular: Vec<Worker> = workers
        .iter()
        .filter(|w| !w.is_admin_mirror())
        .cloned()
        .collect();
    let regular_ids: HashSet<String> = regular
        .iter()
        .map(|w| normalize_national_id(&w.rut))
        .collect();

    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(admins.len() + regular.len());
    for admin in admins {
        let rut = normalize_national_id(&admin.rut);
        if rut.is_empty() || regular_ids.contains(&rut) || !seen.insert(rut) {
            continue;
        }
        result.push(Worker {
            id: mirror_worker_id(admin),
            nombre: admin.full_name(),
            rut: admin.rut.trim().to_string(),
            email: admin.email.trim().to_string(),
            grupo_id: admin.grupo_id.clone(),
            telefono1: admin.telefono.trim().to_string(),
            telefono2: String::new(),
            telefono3: String::new(),
            kind: WorkerKind::AdminMirrored,
        });
    }
    result.extend(regular);
    result
}

/// Remove a worker row by index. Admin-mirrored rows are read-only.
pub fn remove_worker(workers: &mut Vec<Worker>, index: usize) -> Result<Worker, CoreError> {
    match workers.get(index) {
        None => Err(CoreError::NotFound {
            entity: "Worker",
            key: index.to_string(),
        }),
        Some(w) if w.is_admin_mirror() => Err(CoreError::Conflict(
            "Los trabajadores derivados de administradores no se pueden eliminar".to_string(),
        )),
        Some(_) => Ok(workers.remove(index)),
    }
}

// ---------------------------------------------------------------------------
// Assignment selection
// ---------------------------------------------------------------------------

/// Workers offered in the assignment picker: those without a valid
/// assignment. This is a selection filter only; the data model allows
/// several assignments per worker.
pub fn assignable_workers<'a>(workers: &'a [Worker], assignments: &[Assignment]) -> Vec<&'a Worker> {
    let assigned: HashSet<&str> = assignments
        .iter()
        .filter(|a| a.is_valid())
        .map(|a| a.trabajador_id.as_str())
        .collect();
    workers
        .iter()
        .filter(|w| !assigned.contains(w.id.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn group(id: &str, name: &str) -> Group {
        Group {
            id: id.into(),
            nombre: name.into(),
            descripcion: String::new(),
        }
    }

    #[test]
    fn ensure_group_finds_case_insensitively() {
        let groups = vec![group("g1", "Bodega")];
        let (updated, id) = ensure_group_by_name(&groups, "  bodega ");
        assert_eq!(id, "g1");
        assert_eq!(updated, groups);
    }

    #[test]
    fn typed_group_reuses_a_pasted_one() {
        let mut state = WizardState::default();
        state.admins.push(Admin::default());
        let import = parse_bulk_workers("nombre;rut;email;grupo\nLuis;76.086.428-5;;GTS", &[]);
        state.company.grupos = import.groups;
        state.workers = import.workers;
        let pasted = state.workers[0].grupo_id.clone();

        let id = assign_group_by_name(&mut state, RosterSection::Admins, 0, " gts ").unwrap();

        assert_eq!(id, pasted);
        assert_eq!(state.company.grupos.len(), 1);
        assert_eq!(state.admins[0].grupo_id, pasted);
    }

    #[test]
    fn typed_group_is_created_once_and_blank_clears() {
        let mut state = WizardState::default();
        state.workers.push(Worker {
            id: "w1".into(),
            ..Default::default()
        });
        let id = assign_group_by_name(&mut state, RosterSection::Workers, 0, "Bodega")
            .unwrap()
            .expect("group id");
        assert_eq!(state.company.grupos.len(), 1);
        assert_eq!(state.company.grupos[0].id, id);

        assert_eq!(
            assign_group_by_name(&mut state, RosterSection::Workers, 0, "  ").unwrap(),
            None
        );
        assert_eq!(state.workers[0].grupo_id, None);
        assert_eq!(state.company.grupos.len(), 1);
    }

    #[test]
    fn typed_group_refuses_mirrors_and_missing_rows() {
        let mut state = WizardState::default();
        state.workers.push(Worker {
            kind: WorkerKind::AdminMirrored,
            ..Default::default()
        });
        assert_matches!(
            assign_group_by_name(&mut state, RosterSection::Workers, 0, "GTS"),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            assign_group_by_name(&mut state, RosterSection::Admins, 3, "GTS"),
            Err(CoreError::NotFound { .. })
        );
        assert!(state.company.grupos.is_empty());
    }

    #[test]
    fn ensure_group_appends_when_missing() {
        let (updated, id) = ensure_group_by_name(&[], " Ventas ");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, id);
        assert_eq!(updated[0].nombre, "Ventas");
    }

    #[test]
    fn bulk_import_converges_group_names() {
        let text = "Nombre\tRUT\tEmail\tGrupo\n\
                    Ana Soto\t12.345.678-5\tana@x.cl\tGTS\n\
                    Luis Rojas\t76.086.428-5\t\tgts\n";
        let import = parse_bulk_workers(text, &[]);
        assert_eq!(import.workers.len(), 2);
        assert_eq!(import.groups.len(), 1);
        let gid = import.groups[0].id.clone();
        assert!(import.workers.iter().all(|w| w.grupo_id.as_deref() == Some(gid.as_str())));
        assert!(import.rejected.is_empty());
    }

    #[test]
    fn bulk_import_reuses_existing_group_and_semicolons() {
        let existing = vec![group("g-ops", "Operaciones")];
        let import = parse_bulk_workers("Ana;12.345.678-5;;OPERACIONES;+569", &existing);
        assert_eq!(import.groups, existing);
        assert_eq!(import.workers[0].grupo_id.as_deref(), Some("g-ops"));
        assert_eq!(import.workers[0].telefono1, "+569");
    }

    #[test]
    fn bulk_import_rejects_invalid_rows_without_creating_groups() {
        let import = parse_bulk_workers("Pedro\t12.345.678-0\t\tNuevo\n\n", &[]);
        assert!(import.workers.is_empty());
        assert!(import.groups.is_empty());
        assert_eq!(import.rejected.len(), 1);
        assert_eq!(import.rejected[0].line, 1);
    }

    #[test]
    fn mirrors_follow_admin_list() {
        let admins = vec![
            Admin {
                nombre: "Ana".into(),
                apellido: "Soto".into(),
                rut: "12.345.678-5".into(),
                email: "ana@x.cl".into(),
                telefono: "+569".into(),
                grupo_id: None,
            },
            Admin {
                nombre: "Sin rut".into(),
                ..Default::default()
            },
        ];
        let regular = Worker {
            id: "w1".into(),
            nombre: "Luis".into(),
            rut: "76.086.428-5".into(),
            ..Default::default()
        };
        let workers = sync_admin_mirrors(&admins, &[regular.clone()]);
        assert_eq!(workers.len(), 2);
        assert!(workers[0].is_admin_mirror());
        assert_eq!(workers[0].id, "admin-123456785");
        assert_eq!(workers[0].nombre, "Ana Soto");
        assert_eq!(workers[1], regular);

        // Removing the admin removes the mirror.
        let workers = sync_admin_mirrors(&[], &workers);
        assert_eq!(workers, vec![regular]);
    }

    #[test]
    fn admin_already_listed_as_worker_is_not_mirrored() {
        let admin = Admin {
            nombre: "Ana".into(),
            rut: "12.345.678-5".into(),
            ..Default::default()
        };
        let worker = Worker {
            id: "w1".into(),
            nombre: "Ana".into(),
            rut: "123456785".into(),
            ..Default::default()
        };
        assert_eq!(sync_admin_mirrors(&[admin], &[worker]).len(), 1);
    }

    #[test]
    fn mirrored_workers_cannot_be_removed() {
        let mut workers = vec![
            Worker {
                kind: WorkerKind::AdminMirrored,
                ..Default::default()
            },
            Worker::default(),
        ];
        assert_matches!(remove_worker(&mut workers, 0), Err(CoreError::Conflict(_)));
        assert_matches!(remove_worker(&mut workers, 5), Err(CoreError::NotFound { .. }));
        assert!(remove_worker(&mut workers, 1).is_ok());
        assert_eq!(workers.len(), 1);
    }

    #[test]
    fn assignable_filters_validly_assigned_workers() {
        let workers = vec![
            Worker {
                id: "w1".into(),
                ..Default::default()
            },
            Worker {
                id: "w2".into(),
                ..Default::default()
            },
        ];
        let assignments = vec![
            Assignment {
                trabajador_id: "w1".into(),
                planificacion_id: "p1".into(),
                fecha_inicio: "2024-01-01".into(),
                fecha_fin: "2024-12-31".into(),
            },
            Assignment {
                trabajador_id: "w2".into(),
                ..Default::default()
            },
        ];
        let ids: Vec<&str> = assignable_workers(&workers, &assignments)
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(ids, vec!["w2"]);
    }
}
