use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wizard_flow::{Context, Result, Task, TaskResult};

use super::navigation::{StepInput, navigate};
use super::session_keys;
use super::types::NavigationCommand;
use crate::models::WizardStep;
use crate::notifications::ToastBus;

/// Step 3: when the service is needed, and for how long
pub struct ScheduleTask {
    toasts: Arc<ToastBus>,
}

impl ScheduleTask {
    pub fn new(toasts: Arc<ToastBus>) -> Self {
        Self { toasts }
    }
}

#[async_trait]
impl Task for ScheduleTask {
    fn id(&self) -> &str {
        WizardStep::Schedule.task_id()
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let input = StepInput::load(&context).await;

        if input.command == Some(NavigationCommand::Next)
            && !context.contains(session_keys::ESTIMATE)
        {
            // pricing is optional; submission without it lets the provider quote
            debug!(session_id = %input.session_id, "leaving schedule without a price estimate");
        }

        navigate(WizardStep::Schedule, &input, &context, &self.toasts).await
    }
}
