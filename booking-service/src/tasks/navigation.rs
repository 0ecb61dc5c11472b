//! Navigation shared by the four step tasks.

use std::sync::Arc;

use tracing::{debug, info};
use wizard_flow::{Context, NextAction, Result, TaskResult};

use super::session_keys;
use super::types::NavigationCommand;
use crate::models::{BookingDraft, ServiceSummary, WizardStep};
use crate::notifications::ToastBus;
use crate::validation::{FieldError, validate_step};

pub(crate) const SUBMIT_FROM_EARLIER_STEP: &str =
    "Please complete every step before submitting your booking";

/// What a step task reads from the session before deciding where to go
pub(crate) struct StepInput {
    pub session_id: String,
    pub command: Option<NavigationCommand>,
    pub draft: BookingDraft,
    pub catalogue: Vec<ServiceSummary>,
}

impl StepInput {
    /// Load the draft and take the pending command out of the context.
    pub async fn load(context: &Context) -> Self {
        let session_id = context
            .get::<String>(session_keys::SESSION_ID)
            .await
            .unwrap_or_else(|| "unknown".to_string());
        let command = context
            .remove(session_keys::COMMAND)
            .await
            .and_then(|value| serde_json::from_value(value).ok());

        Self {
            session_id,
            command,
            draft: context.get(session_keys::DRAFT).await.unwrap_or_default(),
            catalogue: context
                .get(session_keys::CATALOGUE)
                .await
                .unwrap_or_default(),
        }
    }
}

pub(crate) fn step_status(step: WizardStep) -> String {
    format!("Step {} of {}: {}", step.number(), WizardStep::ALL.len(), step.title())
}

/// Stay on `step`, reporting the errors on the session and the first one as a
/// toast.
pub(crate) async fn stay_with_errors(
    step: WizardStep,
    input: &StepInput,
    errors: Vec<FieldError>,
    context: &Context,
    toasts: &Arc<ToastBus>,
) -> Result<TaskResult> {
    if let Some(first) = errors.first() {
        toasts.error(Some(&input.session_id), first.message.clone());
    }
    info!(
        session_id = %input.session_id,
        step = step.number(),
        errors = errors.len(),
        "step is incomplete"
    );
    context.set(session_keys::FIELD_ERRORS, &errors).await?;

    Ok(TaskResult::new_with_status(
        Some(step.title().to_string()),
        NextAction::WaitForInput,
        Some(step_status(step)),
    ))
}

/// Leave `step` for `target`, clearing errors recorded by an earlier attempt.
pub(crate) async fn move_to(
    step: WizardStep,
    target: WizardStep,
    action: NextAction,
    input: &StepInput,
    context: &Context,
) -> Result<TaskResult> {
    context
        .set(session_keys::FIELD_ERRORS, Vec::<FieldError>::new())
        .await?;
    info!(
        session_id = %input.session_id,
        from = step.number(),
        to = target.number(),
        "moving between wizard steps"
    );
    Ok(TaskResult::new_with_status(
        Some(target.title().to_string()),
        action,
        Some(step_status(target)),
    ))
}

pub(crate) fn wait_on(step: WizardStep) -> Result<TaskResult> {
    Ok(TaskResult::new_with_status(
        Some(step.title().to_string()),
        NextAction::WaitForInput,
        Some(step_status(step)),
    ))
}

/// `Next` and `Previous` for any step. `Submit` is only meaningful on the
/// payment step, which handles it before calling this.
pub(crate) async fn navigate(
    step: WizardStep,
    input: &StepInput,
    context: &Context,
    toasts: &Arc<ToastBus>,
) -> Result<TaskResult> {
    match input.command {
        Some(NavigationCommand::Next) => {
            let errors = validate_step(step, &input.draft, &input.catalogue);
            if !errors.is_empty() {
                return stay_with_errors(step, input, errors, context, toasts).await;
            }
            match following_step(step) {
                Some(next) => move_to(step, next, NextAction::Continue, input, context).await,
                None => {
                    context
                        .set(session_keys::FIELD_ERRORS, Vec::<FieldError>::new())
                        .await?;
                    wait_on(step)
                }
            }
        }
        Some(NavigationCommand::Previous) => match preceding_step(step) {
            Some(previous) => move_to(step, previous, NextAction::GoBack, input, context).await,
            None => wait_on(step),
        },
        Some(NavigationCommand::Submit) => {
            toasts.error(Some(&input.session_id), SUBMIT_FROM_EARLIER_STEP);
            wait_on(step)
        }
        None => {
            debug!(session_id = %input.session_id, step = step.number(), "no command pending");
            wait_on(step)
        }
    }
}

fn following_step(step: WizardStep) -> Option<WizardStep> {
    WizardStep::ALL.get(step.number() as usize).copied()
}

fn preceding_step(step: WizardStep) -> Option<WizardStep> {
    (step.number() as usize)
        .checked_sub(2)
        .and_then(|index| WizardStep::ALL.get(index).copied())
}
