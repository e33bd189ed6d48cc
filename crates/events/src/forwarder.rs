//! Background delivery of progress pings.
//!
//! [`ProgressForwarder`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and sends every received ping to the CRM. Failures are logged and
//! dropped. The loop ends when the bus is dropped.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::bus::ProgressEvent;
use crate::delivery::webhook::CrmSink;

pub struct ProgressForwarder;

impl ProgressForwarder {
    pub async fn run(sink: Arc<dyn CrmSink>, mut receiver: broadcast::Receiver<ProgressEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = sink.send(&event.payload).await {
                        tracing::warn!(
                            error = %e,
                            session_key = %event.session_key,
                            "Failed to forward progress ping"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Progress forwarder lagged, pings dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, progress forwarder shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use chrono::Utc;
    use onboard_core::model::WizardState;
    use onboard_core::onboarding_wizard::OnboardingStep;
    use onboard_core::submission::{build_progress_ping, CrmPayload, SubmissionContext};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<CrmPayload>>,
        fail: bool,
    }

    #[async_trait]
    impl CrmSink for RecordingSink {
        async fn send(&self, payload: &CrmPayload) -> Result<(), CollaboratorError> {
            self.seen.lock().await.push(payload.clone());
            if self.fail {
                Err(CollaboratorError::HttpStatus(500))
            } else {
                Ok(())
            }
        }
    }

    fn event(step: OnboardingStep) -> ProgressEvent {
        let ctx = SubmissionContext {
            external_record_id: None,
            created_externally: false,
            has_token: false,
            now: Utc::now(),
        };
        ProgressEvent::new("local-1", build_progress_ping(&ctx, &WizardState::default(), step))
    }

    async fn forward(sink: Arc<RecordingSink>, steps: &[OnboardingStep]) {
        let bus = EventBus::default();
        let handle = tokio::spawn(ProgressForwarder::run(sink, bus.subscribe()));
        for step in steps {
            bus.publish(event(*step));
        }
        drop(bus);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn forwards_every_ping_then_stops_when_bus_drops() {
        let sink = Arc::new(RecordingSink::default());
        forward(sink.clone(), &[OnboardingStep::Company, OnboardingStep::Admin]).await;
        assert_eq!(sink.seen.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn delivery_failures_do_not_stop_the_loop() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        forward(sink.clone(), &[OnboardingStep::Company, OnboardingStep::Admin]).await;
        assert_eq!(sink.seen.lock().await.len(), 2);
    }
}
