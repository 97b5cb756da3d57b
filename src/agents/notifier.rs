// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Notifier agent
//!
//! Condenses the report into a channel message and delivers it through the
//! messaging collaborator. The returned output embeds the delivered body and
//! a confirmation naming the recipient, which is what the notify stage's
//! structural guardrail inspects. Delivery failure is a stage rejection;
//! nothing is swallowed.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{system_prompt, StageAgent, StageInput, StageOutput};
use crate::errors::EvalflowError;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};
use crate::pipeline::{GuardrailSpec, Role, Stage};

/// Notifier agent
pub struct NotifierAgent {
    backend: Arc<dyn ChatBackend>,
    messaging: Arc<dyn crate::tools::Messaging>,
}

impl NotifierAgent {
    pub fn new(backend: Arc<dyn ChatBackend>, messaging: Arc<dyn crate::tools::Messaging>) -> Self {
        Self { backend, messaging }
    }

    /// The recipient is declared on the stage's structural guardrail
    fn recipient_for(stage: &Stage) -> Result<&str, EvalflowError> {
        match &stage.guardrail {
            Some(GuardrailSpec::Structural { recipient, .. }) => Ok(recipient),
            _ => Err(EvalflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Notify stage requires a structural guardrail naming the recipient"
                    .to_string(),
            }),
        }
    }
}

#[async_trait]
impl StageAgent for NotifierAgent {
    async fn execute(
        &self,
        stage: &Stage,
        input: &StageInput,
    ) -> Result<StageOutput, EvalflowError> {
        let recipient = Self::recipient_for(stage)?;

        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt(stage)),
            ChatMessage::user(format!(
                "{}\n\nRecipient: {}\n\nReport:\n{}",
                stage.prompt.instructions,
                recipient,
                input.bound_text()
            )),
        ]);

        let response = self.backend.complete(request).await?;
        let body = response.text;

        let receipt = self.messaging.send(recipient, &body).await?;
        info!(recipient = %receipt.recipient, ts = %receipt.timestamp, "message delivered");

        Ok(StageOutput::text(format!(
            "Message delivered to {recipient}.\n\n{body}"
        )))
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), EvalflowError> {
        if stage.role != Role::Notify {
            return Err(EvalflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Expected a notify stage".to_string(),
            });
        }
        Self::recipient_for(stage).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatResponse;
    use crate::pipeline::Pipeline;
    use crate::tools::{DeliveryReceipt, Messaging};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EvalflowError> {
            Ok(ChatResponse {
                text: request.messages.last().unwrap().content.clone(),
            })
        }
    }

    struct CountingMessenger {
        sends: AtomicU32,
        fail: bool,
    }

    impl CountingMessenger {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sends: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Messaging for CountingMessenger {
        async fn send(&self, recipient: &str, _body: &str) -> Result<DeliveryReceipt, EvalflowError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EvalflowError::DeliveryFailed {
                    recipient: recipient.to_string(),
                    reason: "channel_not_found".into(),
                })
            } else {
                Ok(DeliveryReceipt {
                    recipient: recipient.to_string(),
                    timestamp: "1724900000.000100".into(),
                })
            }
        }
    }

    fn notify_stage() -> Stage {
        Pipeline::speaker_evaluation_template("t", "#speaker-review").stages[3].clone()
    }

    #[tokio::test]
    async fn test_delivery_confirmation_names_recipient() {
        let messenger = CountingMessenger::new(false);
        let agent = NotifierAgent::new(Arc::new(EchoBackend), messenger.clone());

        let output = agent
            .execute(
                &notify_stage(),
                &StageInput::from_prior("Dr. Doe", StageOutput::text("# Report")),
            )
            .await
            .unwrap();

        assert_eq!(messenger.sends.load(Ordering::SeqCst), 1);
        assert!(output.text.contains("delivered to #speaker-review"));
        assert!(output.text.contains("# Report"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_surfaced() {
        let messenger = CountingMessenger::new(true);
        let agent = NotifierAgent::new(Arc::new(EchoBackend), messenger.clone());

        let err = agent
            .execute(
                &notify_stage(),
                &StageInput::from_prior("Dr. Doe", StageOutput::text("# Report")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EvalflowError::DeliveryFailed { .. }));
        // Delivery failures stay retryable so the executor can spend budget
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validate_requires_structural_guardrail() {
        let agent = NotifierAgent::new(Arc::new(EchoBackend), CountingMessenger::new(false));
        let mut stage = notify_stage();
        stage.guardrail = None;
        assert!(agent.validate_stage(&stage).is_err());
    }
}
