use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use wizard_flow::{Context, Result, Task, TaskResult};

use super::navigation::{StepInput, navigate};
use super::session_keys;
use super::types::NavigationCommand;
use crate::models::WizardStep;
use crate::notifications::ToastBus;

/// Step 1: pick a service from the catalogue
pub struct ServiceSelectionTask {
    toasts: Arc<ToastBus>,
}

impl ServiceSelectionTask {
    pub fn new(toasts: Arc<ToastBus>) -> Self {
        Self { toasts }
    }
}

#[async_trait]
impl Task for ServiceSelectionTask {
    fn id(&self) -> &str {
        WizardStep::ServiceSelection.task_id()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut input = StepInput::load(&context).await;

        // the catalogue knows the category of the chosen service
        if input.command == Some(NavigationCommand::Next) && input.draft.category.trim().is_empty() {
            let category = input
                .catalogue
                .iter()
                .find(|service| service.service_id == input.draft.service_id)
                .map(|service| service.category.clone())
                .filter(|category| !category.is_empty());
            if let Some(category) = category {
                info!(
                    session_id = %input.session_id,
                    service_id = %input.draft.service_id,
                    category = %category,
                    "filled category from catalogue"
                );
                input.draft.category = category;
                context.set(session_keys::DRAFT, &input.draft).await?;
            }
        }

        navigate(WizardStep::ServiceSelection, &input, &context, &self.toasts).await
    }
}
