use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use super::navigation::{StepInput, move_to, navigate, stay_with_errors};
use super::types::NavigationCommand;
use crate::models::WizardStep;
use crate::notifications::ToastBus;
use crate::validation::first_invalid_step;

/// Step 4: payment method and insurance, then submission.
///
/// `Submit` re-checks every step in wizard order. The first invalid one
/// becomes the current step; when all are valid the submission task runs
/// straight away.
pub struct PaymentTask {
    toasts: Arc<ToastBus>,
}

impl PaymentTask {
    pub fn new(toasts: Arc<ToastBus>) -> Self {
        Self { toasts }
    }
}

#[async_trait]
impl Task for PaymentTask {
    fn id(&self) -> &str {
        WizardStep::Payment.task_id()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = StepInput::load(&context).await;
        if input.command != Some(NavigationCommand::Submit) {
            return navigate(WizardStep::Payment, &input, &context, &self.toasts).await;
        }

        match first_invalid_step(&input.draft, &input.catalogue) {
            Some((WizardStep::Payment, errors)) => {
                stay_with_errors(WizardStep::Payment, &input, errors, &context, &self.toasts).await
            }
            Some((step, errors)) => {
                info!(
                    session_id = %input.session_id,
                    step = step.number(),
                    "submission blocked by an earlier step"
                );
                let result = stay_with_errors(step, &input, errors, &context, &self.toasts).await?;
                Ok(TaskResult::new_with_status(
                    result.response,
                    NextAction::GoTo(step.task_id().to_string()),
                    result.status_message,
                ))
            }
            None => {
                info!(session_id = %input.session_id, "all steps valid, submitting booking");
                let mut result = move_to(
                    WizardStep::Payment,
                    WizardStep::Payment,
                    NextAction::ContinueAndExecute,
                    &input,
                    &context,
                )
                .await?;
                result.status_message = Some("Submitting booking".to_string());
                Ok(result)
            }
        }
    }
}
