use std::sync::Arc;

use async_trait::async_trait;
use wizard_flow::{Context, Result, Task, TaskResult};

use super::navigation::{StepInput, navigate};
use super::session_keys;
use super::types::NavigationCommand;
use crate::models::{CustomerDetails, WizardStep};
use crate::notifications::ToastBus;

/// Step 2: who the service is for and where
pub struct CustomerInformationTask {
    toasts: Arc<ToastBus>,
}

impl CustomerInformationTask {
    pub fn new(toasts: Arc<ToastBus>) -> Self {
        Self { toasts }
    }
}

/// Phone numbers are stored without the spaces people type into them
fn compact_numbers(customer: &mut CustomerDetails) {
    for number in [&mut customer.phone, &mut customer.emergency_contact] {
        number.retain(|c| !c.is_whitespace());
    }
}

#[async_trait]
impl Task for CustomerInformationTask {
    fn id(&self) -> &str {
        WizardStep::CustomerInformation.task_id()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut input = StepInput::load(&context).await;

        if input.command == Some(NavigationCommand::Next) {
            let before = input.draft.customer.clone();
            compact_numbers(&mut input.draft.customer);
            if input.draft.customer != before {
                context.set(session_keys::DRAFT, &input.draft).await?;
            }
        }

        navigate(
            WizardStep::CustomerInformation,
            &input,
            &context,
            &self.toasts,
        )
        .await
    }
}
