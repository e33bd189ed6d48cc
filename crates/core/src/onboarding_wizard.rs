//! Onboarding wizard steps and navigation.
//!
//! Defines the step identifiers, the explicit transition table with its two
//! branch points, the navigation history stack, and the resume rules used
//! when a session is reopened from a draft or a remote record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::WizardState;
use crate::validation::{
    validate_admin_fields, validate_assignments, validate_company_fields, validate_schedules,
    validate_shifts, validate_workers, ValidationOutcome,
};

// ---------------------------------------------------------------------------
// Onboarding status
// ---------------------------------------------------------------------------

/// Status reported to the remote record store (`estado`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    #[serde(rename = "en_progreso")]
    InProgress,
    #[serde(rename = "completado")]
    Completed,
}

impl OnboardingStatus {
    /// Parse a status string as stored remotely.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "en_progreso" => Ok(Self::InProgress),
            "completado" => Ok(Self::Completed),
            _ => Err(CoreError::Validation(format!(
                "Invalid onboarding status '{s}'. Must be one of: en_progreso, completado"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "en_progreso",
            Self::Completed => "completado",
        }
    }
}

// ---------------------------------------------------------------------------
// Onboarding steps
// ---------------------------------------------------------------------------

/// The twelve steps of the wizard, in path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Welcome,
    PreInfo,
    Company,
    Admin,
    LoadWorkersDecision,
    Workers,
    ConfigureDecision,
    Shifts,
    Schedules,
    Assignments,
    Summary,
    ThankYou,
}

/// Total number of steps in the wizard.
pub const TOTAL_STEPS: u8 = 12;

impl OnboardingStep {
    pub const ALL: [OnboardingStep; TOTAL_STEPS as usize] = [
        Self::Welcome,
        Self::PreInfo,
        Self::Company,
        Self::Admin,
        Self::LoadWorkersDecision,
        Self::Workers,
        Self::ConfigureDecision,
        Self::Shifts,
        Self::Schedules,
        Self::Assignments,
        Self::Summary,
        Self::ThankYou,
    ];

    /// Convert a 0-based step index (as stored by the record store).
    pub fn from_index(n: u8) -> Result<Self, CoreError> {
        Self::ALL.get(n as usize).copied().ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid step index {n}. Must be between 0 and {}",
                TOTAL_STEPS - 1
            ))
        })
    }

    /// 0-based index of the step.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::PreInfo => "pre_info",
            Self::Company => "company",
            Self::Admin => "admin",
            Self::LoadWorkersDecision => "load_workers_decision",
            Self::Workers => "workers",
            Self::ConfigureDecision => "configure_decision",
            Self::Shifts => "shifts",
            Self::Schedules => "schedules",
            Self::Assignments => "assignments",
            Self::Summary => "summary",
            Self::ThankYou => "thank_you",
        }
    }

    /// Human-readable label for the step.
    pub fn label(self) -> &'static str {
        match self {
            Self::Welcome => "Bienvenida",
            Self::PreInfo => "Antes de comenzar",
            Self::Company => "Empresa",
            Self::Admin => "Administradores",
            Self::LoadWorkersDecision => "Carga de trabajadores",
            Self::Workers => "Trabajadores",
            Self::ConfigureDecision => "Configuración de turnos",
            Self::Shifts => "Turnos",
            Self::Schedules => "Planificaciones",
            Self::Assignments => "Asignaciones",
            Self::Summary => "Resumen",
            Self::ThankYou => "Gracias",
        }
    }

    /// Branch points carry no data; they record a now/later decision.
    pub fn is_decision(self) -> bool {
        matches!(self, Self::LoadWorkersDecision | Self::ConfigureDecision)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::ThankYou
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage of the wizard completed when standing on `step`.
pub fn percent_complete(step: OnboardingStep) -> u8 {
    let last = u32::from(TOTAL_STEPS - 1);
    (u32::from(step.index()) * 100 / last) as u8
}

// ---------------------------------------------------------------------------
// Decisions and transitions
// ---------------------------------------------------------------------------

/// Answer recorded at a decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Now,
    Later,
}

impl Decision {
    pub fn from_flag(now: bool) -> Self {
        if now {
            Self::Now
        } else {
            Self::Later
        }
    }

    pub fn is_now(self) -> bool {
        self == Self::Now
    }
}

/// One forward edge of the step graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: OnboardingStep,
    pub to: OnboardingStep,
    /// Steps bypassed by a "later" branch. They never enter the history
    /// and are marked completed.
    pub skipped: Vec<OnboardingStep>,
}

impl Transition {
    fn direct(from: OnboardingStep, to: OnboardingStep) -> Self {
        Self {
            from,
            to,
            skipped: Vec::new(),
        }
    }
}

/// Field-level errors that blocked leaving a step.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("Validation failed at step {step}: {}", .errors.join("; "))]
pub struct ValidationFailure {
    pub step: OnboardingStep,
    pub errors: Vec<String>,
    pub field_errors: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("A decision is required at step {0}")]
    DecisionRequired(OnboardingStep),

    #[error("The summary step is left by submitting the onboarding")]
    SubmissionRequired,

    #[error("Step {0} is not the current step")]
    NotAtStep(OnboardingStep),

    #[error("The onboarding is already finished")]
    Terminal,
}

/// The transition table. Decision steps need `decision`; every other step
/// ignores it.
pub fn next_transition(
    step: OnboardingStep,
    decision: Option<Decision>,
) -> Result<Transition, NavigationError> {
    use OnboardingStep::*;

    let transition = match step {
        Welcome => Transition::direct(Welcome, PreInfo),
        PreInfo => Transition::direct(PreInfo, Company),
        Company => Transition::direct(Company, Admin),
        Admin => Transition::direct(Admin, LoadWorkersDecision),
        LoadWorkersDecision => match decision {
            Some(Decision::Now) => Transition::direct(LoadWorkersDecision, Workers),
            Some(Decision::Later) => Transition {
                from: LoadWorkersDecision,
                to: ConfigureDecision,
                skipped: vec![Workers],
            },
            None => return Err(NavigationError::DecisionRequired(step)),
        },
        Workers => Transition::direct(Workers, ConfigureDecision),
        ConfigureDecision => match decision {
            Some(Decision::Now) => Transition::direct(ConfigureDecision, Shifts),
            Some(Decision::Later) => Transition {
                from: ConfigureDecision,
                to: Summary,
                skipped: vec![Shifts, Schedules, Assignments],
            },
            None => return Err(NavigationError::DecisionRequired(step)),
        },
        Shifts => Transition::direct(Shifts, Schedules),
        Schedules => Transition::direct(Schedules, Assignments),
        Assignments => Transition::direct(Assignments, Summary),
        Summary => Transition::direct(Summary, ThankYou),
        ThankYou => return Err(NavigationError::Terminal),
    };
    Ok(transition)
}

/// The decision recorded in `state` for a decision step.
pub fn recorded_decision(step: OnboardingStep, state: &WizardState) -> Option<Decision> {
    match step {
        OnboardingStep::LoadWorkersDecision => state.load_workers_now.map(Decision::from_flag),
        OnboardingStep::ConfigureDecision => state.configure_shifts_now.map(Decision::from_flag),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Step validation
// ---------------------------------------------------------------------------

/// Run the validator that gates leaving `step`.
pub fn validate_step(step: OnboardingStep, state: &WizardState) -> ValidationOutcome {
    match step {
        OnboardingStep::Company => validate_company_fields(&state.company),
        OnboardingStep::Admin => validate_admin_fields(&state.admins),
        OnboardingStep::Workers => {
            let mut outcome = validate_workers(&state.workers);
            if state.regular_workers().next().is_none() {
                outcome.is_valid = false;
                outcome
                    .errors
                    .push("Debe agregar al menos un trabajador".to_string());
            }
            outcome
        }
        OnboardingStep::Shifts => validate_shifts(&state.shifts),
        OnboardingStep::Schedules => validate_schedules(&state.schedule_patterns),
        OnboardingStep::Assignments => validate_assignments(state),
        _ => ValidationOutcome::ok(),
    }
}

/// The most advanced step the data in `state` supports.
///
/// Monotonic: adding data never moves the result backwards.
pub fn calculate_first_incomplete_step(state: &WizardState) -> OnboardingStep {
    if state.has_valid_assignments() {
        OnboardingStep::Summary
    } else if !state.schedule_patterns.is_empty() {
        OnboardingStep::Assignments
    } else if state.custom_shifts().next().is_some() {
        OnboardingStep::Schedules
    } else if state.regular_workers().next().is_some() {
        OnboardingStep::ConfigureDecision
    } else if !state.admins.is_empty() {
        OnboardingStep::LoadWorkersDecision
    } else if !state.company.razon_social.trim().is_empty() && !state.company.rut.trim().is_empty()
    {
        OnboardingStep::Admin
    } else {
        OnboardingStep::Company
    }
}

/// The furthest step `go_next` can reach from the first incomplete step
/// without new input: recorded decisions are followed and data steps whose
/// validator already passes are crossed. Never past the summary.
pub fn furthest_supported_step(state: &WizardState) -> OnboardingStep {
    let mut step = calculate_first_incomplete_step(state);
    while step < OnboardingStep::Summary {
        if !validate_step(step, state).is_valid {
            break;
        }
        match next_transition(step, recorded_decision(step, state)) {
            Ok(transition) => step = transition.to,
            Err(_) => break,
        }
    }
    step
}

/// Check every gate on the way from the start to `target` along the
/// recorded decisions.
pub fn validate_path_to(target: OnboardingStep, state: &WizardState) -> Result<(), NavigationError> {
    let mut step = OnboardingStep::Welcome;
    while step < target {
        let outcome = validate_step(step, state);
        if !outcome.is_valid {
            return Err(ValidationFailure {
                step,
                errors: outcome.errors,
                field_errors: outcome.field_errors,
            }
            .into());
        }
        step = next_transition(step, recorded_decision(step, state))?.to;
    }
    Ok(())
}

/// Walk the graph from the start until `target`, following the given
/// decisions. Returns the visited steps and those skipped on the way, or
/// `None` when `target` is not on that path.
fn path_to(
    target: OnboardingStep,
    load_workers: Decision,
    configure_shifts: Decision,
) -> Option<(Vec<OnboardingStep>, Vec<OnboardingStep>)> {
    let mut visited = vec![OnboardingStep::Welcome];
    let mut skipped = Vec::new();
    let mut current = OnboardingStep::Welcome;

    while current != target {
        let decision = match current {
            OnboardingStep::LoadWorkersDecision => Some(load_workers),
            OnboardingStep::ConfigureDecision => Some(configure_shifts),
            _ => None,
        };
        let transition = next_transition(current, decision).ok()?;
        skipped.extend(transition.skipped);
        current = transition.to;
        visited.push(current);
    }
    Some((visited, skipped))
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Current position plus the navigation history stack.
///
/// The current step is always the top of `history`, which never shrinks
/// below one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigator {
    history: Vec<OnboardingStep>,
    completed: BTreeSet<OnboardingStep>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            history: vec![OnboardingStep::Welcome],
            completed: BTreeSet::new(),
        }
    }

    pub fn current(&self) -> OnboardingStep {
        self.history
            .last()
            .copied()
            .unwrap_or(OnboardingStep::Welcome)
    }

    pub fn history(&self) -> &[OnboardingStep] {
        &self.history
    }

    pub fn completed(&self) -> &BTreeSet<OnboardingStep> {
        &self.completed
    }

    pub fn is_completed(&self, step: OnboardingStep) -> bool {
        self.completed.contains(&step)
    }

    pub fn mark_completed(&mut self, steps: impl IntoIterator<Item = OnboardingStep>) {
        self.completed.extend(steps);
    }

    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1 && !self.current().is_terminal()
    }

    /// Validate the current step and advance along the transition table.
    ///
    /// On failure nothing changes. The summary step is not left through
    /// here; see [`Navigator::finish`].
    pub fn go_next(&mut self, state: &WizardState) -> Result<Transition, NavigationError> {
        let step = self.current();
        match step {
            OnboardingStep::ThankYou => return Err(NavigationError::Terminal),
            OnboardingStep::Summary => return Err(NavigationError::SubmissionRequired),
            _ => {}
        }

        let outcome = validate_step(step, state);
        if !outcome.is_valid {
            return Err(ValidationFailure {
                step,
                errors: outcome.errors,
                field_errors: outcome.field_errors,
            }
            .into());
        }

        let transition = next_transition(step, recorded_decision(step, state))?;
        self.apply(&transition);
        Ok(transition)
    }

    /// Move from the summary to the thank-you step after a successful
    /// submission.
    pub fn finish(&mut self) -> Result<Transition, NavigationError> {
        let step = self.current();
        if step != OnboardingStep::Summary {
            return Err(NavigationError::NotAtStep(OnboardingStep::Summary));
        }
        let transition = next_transition(step, None)?;
        self.apply(&transition);
        Ok(transition)
    }

    fn apply(&mut self, transition: &Transition) {
        self.completed.insert(transition.from);
        self.completed.extend(transition.skipped.iter().copied());
        self.history.push(transition.to);
    }

    /// Pop the history. A no-op at the first entry and on the terminal step.
    pub fn go_back(&mut self) -> OnboardingStep {
        if self.can_go_back() {
            self.history.pop();
        }
        self.current()
    }

    /// Rebuild navigation for a reopened session.
    ///
    /// A saved step is trusted when it lies on the path implied by the
    /// state's decisions and the data supports reaching it (see
    /// [`furthest_supported_step`]); otherwise the first incomplete step is
    /// used. A saved history is kept when it ends at that step and has no
    /// repeats; otherwise a linear history is rebuilt.
    pub fn resume(
        state: &WizardState,
        saved_step: Option<OnboardingStep>,
        saved_history: &[OnboardingStep],
    ) -> Self {
        let load_workers = state
            .load_workers_now
            .map(Decision::from_flag)
            .unwrap_or(Decision::Now);
        let configure_shifts = state
            .configure_shifts_now
            .map(Decision::from_flag)
            .unwrap_or(Decision::Now);

        let on_path = |step| path_to(step, load_workers, configure_shifts);

        let supported = furthest_supported_step(state);
        let trusted = saved_step.filter(|s| *s <= supported);

        let (target, (path, skipped)) = match trusted.and_then(|s| on_path(s).map(|p| (s, p))) {
            Some(found) => found,
            None => {
                let computed = calculate_first_incomplete_step(state);
                let path = on_path(computed)
                    .or_else(|| path_to(computed, Decision::Now, Decision::Now))
                    .unwrap_or_else(|| (vec![OnboardingStep::Welcome], Vec::new()));
                (computed, path)
            }
        };

        let mut completed: BTreeSet<OnboardingStep> =
            path.iter().copied().filter(|s| *s != target).collect();
        completed.extend(skipped);

        let history = if history_is_usable(saved_history, target) {
            saved_history.to_vec()
        } else {
            path
        };

        Self { history, completed }
    }

    /// Navigation of an onboarding that was already submitted: parked on
    /// the thank-you step with everything before it completed.
    pub fn finished(state: &WizardState) -> Self {
        let mut navigator = Self::resume(state, None, &[]);
        navigator.completed.extend(
            OnboardingStep::ALL
                .iter()
                .copied()
                .filter(|s| !s.is_terminal()),
        );
        navigator.history.push(OnboardingStep::ThankYou);
        navigator
    }
}

fn history_is_usable(history: &[OnboardingStep], target: OnboardingStep) -> bool {
    if history.last() != Some(&target) {
        return false;
    }
    let unique: BTreeSet<&OnboardingStep> = history.iter().collect();
    unique.len() == history.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, Assignment, SchedulePattern, Shift, Worker, WorkerKind};
    use assert_matches::assert_matches;
    use OnboardingStep::*;

    fn nav_at(history: &[OnboardingStep]) -> Navigator {
        Navigator {
            history: history.to_vec(),
            completed: BTreeSet::new(),
        }
    }

    fn admin() -> model::Admin {
        model::Admin {
            nombre: "Ana".into(),
            rut: "12.345.678-5".into(),
            email: "ana@empresa.cl".into(),
            telefono: "+56911111111".into(),
            ..Default::default()
        }
    }

    fn worker() -> Worker {
        Worker {
            id: "w1".into(),
            nombre: "Luis".into(),
            rut: "76.086.428-5".into(),
            ..Default::default()
        }
    }

    // -- OnboardingStatus --

    #[test]
    fn status_round_trip() {
        for status in [OnboardingStatus::InProgress, OnboardingStatus::Completed] {
            assert_eq!(OnboardingStatus::from_str_db(status.as_str()).unwrap(), status);
        }
        assert!(OnboardingStatus::from_str_db("abandonado").is_err());
    }

    // -- OnboardingStep --

    #[test]
    fn step_index_round_trip() {
        for step in OnboardingStep::ALL {
            assert_eq!(OnboardingStep::from_index(step.index()).unwrap(), step);
            assert!(!step.label().is_empty());
        }
        assert!(OnboardingStep::from_index(TOTAL_STEPS).is_err());
        assert_eq!(Workers.index(), 5);
    }

    #[test]
    fn step_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(LoadWorkersDecision).unwrap(),
            serde_json::json!("load_workers_decision")
        );
        assert_eq!(LoadWorkersDecision.to_string(), "load_workers_decision");
    }

    #[test]
    fn percent_complete_bounds() {
        assert_eq!(percent_complete(Welcome), 0);
        assert_eq!(percent_complete(ThankYou), 100);
        assert!(percent_complete(Workers) > percent_complete(Admin));
    }

    // -- transition table --

    #[test]
    fn decision_steps_need_a_decision() {
        assert_matches!(
            next_transition(LoadWorkersDecision, None),
            Err(NavigationError::DecisionRequired(LoadWorkersDecision))
        );
        assert_matches!(next_transition(ThankYou, None), Err(NavigationError::Terminal));
    }

    #[test]
    fn later_branches_skip_steps() {
        let t = next_transition(LoadWorkersDecision, Some(Decision::Later)).unwrap();
        assert_eq!(t.to, ConfigureDecision);
        assert_eq!(t.skipped, vec![Workers]);

        let t = next_transition(ConfigureDecision, Some(Decision::Later)).unwrap();
        assert_eq!(t.to, Summary);
        assert_eq!(t.skipped, vec![Shifts, Schedules, Assignments]);
    }

    // -- go_next / go_back --

    #[test]
    fn go_next_on_admin_with_zero_admins_fails_in_place() {
        let mut nav = nav_at(&[Welcome, PreInfo, Company, Admin]);
        let before = nav.clone();
        let err = nav.go_next(&WizardState::default()).unwrap_err();
        assert_matches!(err, NavigationError::Validation(ref f) if f.step == Admin);
        assert_eq!(nav, before);
        assert_eq!(nav.current(), Admin);
    }

    #[test]
    fn go_next_pushes_and_marks_completed() {
        let mut nav = nav_at(&[Welcome, PreInfo, Company, Admin]);
        let mut state = WizardState::default();
        state.admins.push(admin());
        let t = nav.go_next(&state).unwrap();
        assert_eq!(t.to, LoadWorkersDecision);
        assert_eq!(nav.history().len(), 5);
        assert!(nav.is_completed(Admin));
    }

    #[test]
    fn decision_step_without_decision_does_not_move() {
        let mut nav = nav_at(&[Welcome, LoadWorkersDecision]);
        assert_matches!(
            nav.go_next(&WizardState::default()),
            Err(NavigationError::DecisionRequired(LoadWorkersDecision))
        );
        assert_eq!(nav.current(), LoadWorkersDecision);
    }

    #[test]
    fn back_from_skipped_branch_returns_to_decision_step() {
        let mut state = WizardState::default();
        state.load_workers_now = Some(false);
        let mut nav = nav_at(&[Welcome, PreInfo, Company, Admin, LoadWorkersDecision]);
        nav.go_next(&state).unwrap();
        assert_eq!(nav.current(), ConfigureDecision);
        assert!(nav.is_completed(Workers));
        assert!(!nav.history().contains(&Workers));
        assert_eq!(nav.go_back(), LoadWorkersDecision);

        state.configure_shifts_now = Some(false);
        let mut nav = nav_at(&[Welcome, ConfigureDecision]);
        nav.go_next(&state).unwrap();
        assert_eq!(nav.current(), Summary);
        assert!(nav.is_completed(Assignments));
        assert_eq!(nav.go_back(), ConfigureDecision);
    }

    #[test]
    fn go_back_never_pops_the_root() {
        let mut nav = Navigator::new();
        assert_eq!(nav.go_back(), Welcome);
        assert_eq!(nav.history().len(), 1);
    }

    #[test]
    fn workers_step_requires_a_regular_worker() {
        let mut state = WizardState::default();
        state.workers.push(Worker {
            kind: WorkerKind::AdminMirrored,
            ..worker()
        });
        assert!(!validate_step(Workers, &state).is_valid);
        state.workers.push(Worker {
            id: "w2".into(),
            rut: "12.345.678-5".into(),
            ..worker()
        });
        assert!(validate_step(Workers, &state).is_valid);
    }

    #[test]
    fn summary_is_left_only_by_finish() {
        let mut nav = nav_at(&[Welcome, Summary]);
        assert_matches!(
            nav.go_next(&WizardState::default()),
            Err(NavigationError::SubmissionRequired)
        );
        nav.finish().unwrap();
        assert_eq!(nav.current(), ThankYou);
        assert!(!nav.can_go_back());
        assert_eq!(nav.go_back(), ThankYou);
        assert_matches!(nav.finish(), Err(NavigationError::NotAtStep(Summary)));
    }

    // -- first incomplete step --

    fn states_of_growing_data() -> Vec<WizardState> {
        let mut states = vec![WizardState::default()];
        let mut s = WizardState::default();
        s.company.razon_social = "Andes SpA".into();
        s.company.rut = "76.086.428-5".into();
        states.push(s.clone());
        s.admins.push(admin());
        states.push(s.clone());
        s.workers.push(worker());
        states.push(s.clone());
        s.shifts.push(Shift {
            id: "t1".into(),
            nombre: "Mañana".into(),
            ..Default::default()
        });
        states.push(s.clone());
        s.schedule_patterns.push(SchedulePattern {
            id: "p1".into(),
            nombre: "5x2".into(),
            ..Default::default()
        });
        states.push(s.clone());
        s.assignments.push(Assignment {
            trabajador_id: "w1".into(),
            planificacion_id: "p1".into(),
            fecha_inicio: "2024-01-01".into(),
            fecha_fin: "permanente".into(),
        });
        states.push(s);
        states
    }

    #[test]
    fn first_incomplete_step_ladder() {
        let steps: Vec<OnboardingStep> = states_of_growing_data()
            .iter()
            .map(calculate_first_incomplete_step)
            .collect();
        assert_eq!(
            steps,
            vec![
                Company,
                Admin,
                LoadWorkersDecision,
                ConfigureDecision,
                Schedules,
                Assignments,
                Summary
            ]
        );
    }

    #[test]
    fn first_incomplete_step_is_monotonic() {
        let steps: Vec<OnboardingStep> = states_of_growing_data()
            .iter()
            .map(calculate_first_incomplete_step)
            .collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn admin_mirrors_do_not_count_as_workers() {
        let mut state = WizardState::default();
        state.admins.push(admin());
        state.workers.push(Worker {
            kind: WorkerKind::AdminMirrored,
            ..worker()
        });
        assert_eq!(calculate_first_incomplete_step(&state), LoadWorkersDecision);
    }

    // -- resume --

    #[test]
    fn resume_at_saved_workers_step_rebuilds_history() {
        let mut state = WizardState::default();
        state.admins.push(admin());
        state.workers.push(worker());
        state.load_workers_now = Some(true);

        let saved = OnboardingStep::from_index(5).unwrap();
        let nav = Navigator::resume(&state, Some(saved), &[]);
        assert_eq!(nav.current(), Workers);
        assert_eq!(
            nav.history(),
            &[Welcome, PreInfo, Company, Admin, LoadWorkersDecision, Workers]
        );
        assert!(nav.is_completed(Admin));
        assert!(!nav.is_completed(Workers));
    }

    #[test]
    fn resume_rejects_step_off_the_decided_path() {
        let mut state = WizardState::default();
        state.admins.push(admin());
        state.load_workers_now = Some(false);
        let nav = Navigator::resume(&state, Some(Workers), &[]);
        assert_eq!(nav.current(), LoadWorkersDecision);
    }

    fn company() -> model::Company {
        model::Company {
            razon_social: "Andes SpA".into(),
            nombre_fantasia: "Andes".into(),
            rut: "76.086.428-5".into(),
            giro: "Servicios de aseo".into(),
            direccion: "Av. Providencia 1234".into(),
            comuna: "Providencia".into(),
            email_facturacion: "facturas@andes.cl".into(),
            telefono_contacto: "+56222222222".into(),
            sistema_marcaje: vec!["web".into()],
            rubro: "Servicios".into(),
            grupos: Vec::new(),
        }
    }

    /// Company and admin filled in, both decisions answered "later".
    fn state_ready_for_summary() -> WizardState {
        let mut state = WizardState::default();
        state.company = company();
        state.admins.push(admin());
        state.load_workers_now = Some(false);
        state.configure_shifts_now = Some(false);
        state
    }

    #[test]
    fn resume_keeps_a_consistent_saved_history() {
        let state = state_ready_for_summary();
        let saved = [Welcome, Company, ConfigureDecision, Summary];
        let nav = Navigator::resume(&state, Some(Summary), &saved);
        assert_eq!(nav.history(), &saved);
        assert!(nav.is_completed(Shifts));
    }

    #[test]
    fn resume_distrusts_a_saved_step_the_data_cannot_reach() {
        let mut state = WizardState::default();
        state.company.razon_social = "X".into();
        let nav = Navigator::resume(&state, Some(Summary), &[Welcome, Summary]);
        assert_eq!(nav.current(), Company);
        assert_eq!(nav.history(), &[Welcome, PreInfo, Company]);
        assert!(!nav.is_completed(Admin));
    }

    #[test]
    fn furthest_supported_follows_recorded_decisions() {
        assert_eq!(furthest_supported_step(&state_ready_for_summary()), Summary);

        let mut state = state_ready_for_summary();
        state.configure_shifts_now = None;
        assert_eq!(furthest_supported_step(&state), ConfigureDecision);

        state.configure_shifts_now = Some(true);
        assert_eq!(furthest_supported_step(&state), Shifts);
    }

    #[test]
    fn path_gates_are_rechecked() {
        assert_eq!(validate_path_to(Summary, &state_ready_for_summary()), Ok(()));

        let mut state = state_ready_for_summary();
        state.admins.clear();
        assert_matches!(
            validate_path_to(Summary, &state),
            Err(NavigationError::Validation(ref f)) if f.step == Admin
        );

        let mut state = state_ready_for_summary();
        state.load_workers_now = None;
        assert_matches!(
            validate_path_to(Summary, &state),
            Err(NavigationError::DecisionRequired(LoadWorkersDecision))
        );
    }

    #[test]
    fn finished_navigator_is_parked_on_thank_you() {
        let nav = Navigator::finished(&state_ready_for_summary());
        assert_eq!(nav.current(), ThankYou);
        assert!(!nav.can_go_back());
        assert!(nav.is_completed(Summary));
        assert!(nav.is_completed(Assignments));
    }

    #[test]
    fn resume_without_saved_step_uses_first_incomplete() {
        let mut state = WizardState::default();
        state.configure_shifts_now = Some(false);
        state.schedule_patterns.push(SchedulePattern {
            id: "p1".into(),
            nombre: "Rotativo".into(),
            ..Default::default()
        });
        // Assignments is skipped under "later", so the all-now path is used.
        let nav = Navigator::resume(&state, None, &[Welcome]);
        assert_eq!(nav.current(), Assignments);
        assert_eq!(nav.history().first(), Some(&Welcome));
        assert_eq!(nav.history().len(), 10);
    }
}
