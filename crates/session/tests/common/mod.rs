#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use onboard_core::model::{Admin, Company};
use onboard_db::{DraftStore, MemoryDraftSlot};
use onboard_events::{
    CsvWorkbookExporter, EventBus, MemoryRecordStore, RecordingCrmSink, StaticPrefillResolver,
};
use onboard_session::{Collaborators, OpenRequest, SessionSettings, WizardSession};
use serde_json::{json, Value};

pub const PREFILL_TOKEN: &str = "tok-andes";

/// In-memory collaborators plus handles to inspect them.
pub struct Harness {
    pub slot: Arc<MemoryDraftSlot>,
    pub store: DraftStore,
    pub records: Arc<MemoryRecordStore>,
    pub crm: Arc<RecordingCrmSink>,
    pub events: Arc<EventBus>,
    pub prefill_records: Vec<(String, Value)>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_crm(RecordingCrmSink::new())
    }

    pub fn with_crm(crm: RecordingCrmSink) -> Self {
        let slot = Arc::new(MemoryDraftSlot::new());
        Self {
            store: DraftStore::new(slot.clone()),
            slot,
            records: Arc::new(MemoryRecordStore::new()),
            crm: Arc::new(crm),
            events: Arc::new(EventBus::default()),
            prefill_records: vec![(
                PREFILL_TOKEN.to_string(),
                json!({
                    "razonSocial": "Andes SpA",
                    "rut": "76.086.428-5",
                    "rubro": "Servicios",
                    "sistemaMarcaje": "web"
                }),
            )],
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let prefill = self
            .prefill_records
            .iter()
            .fold(StaticPrefillResolver::new(), |r, (token, record)| {
                r.with_record(token.clone(), record.clone())
            });
        Collaborators {
            prefill: Arc::new(prefill),
            record_store: self.records.clone(),
            crm: self.crm.clone(),
            exporter: Arc::new(CsvWorkbookExporter),
            events: self.events.clone(),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            debounce: Duration::from_millis(10),
        }
    }

    pub async fn open(&self, token: Option<&str>) -> WizardSession {
        self.open_request(OpenRequest {
            token: token.map(str::to_string),
            session_key: None,
        })
        .await
    }

    pub async fn open_request(&self, request: OpenRequest) -> WizardSession {
        WizardSession::open(request, self.store.clone(), self.collaborators(), &self.settings())
            .await
            .expect("session opens")
    }
}

pub fn company() -> Company {
    Company {
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

pub fn admin() -> Admin {
    Admin {
        nombre: "Ana".into(),
        apellido: "Pérez".into(),
        rut: "12.345.678-5".into(),
        email: "ana@andes.cl".into(),
        telefono: "+56911111111".into(),
        grupo_id: None,
    }
}

/// Walk a fresh session from the welcome step to the admin step.
pub async fn advance_to_admin(session: &mut WizardSession) {
    session.go_next().await.expect("welcome");
    session.go_next().await.expect("pre_info");
    session
        .update_field("company", serde_json::to_value(company()).unwrap())
        .unwrap();
    session.go_next().await.expect("company");
}

/// Walk to the summary step choosing "later" at both decisions.
pub async fn advance_to_summary(session: &mut WizardSession) {
    use onboard_core::onboarding_wizard::Decision;

    advance_to_admin(session).await;
    session
        .update_field("admins", serde_json::to_value(vec![admin()]).unwrap())
        .unwrap();
    session.go_next().await.expect("admin");
    session.decide(Decision::Later).await.expect("load workers later");
    session.decide(Decision::Later).await.expect("configure later");
}
