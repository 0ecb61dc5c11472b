//! The booking wizard facade.
//!
//! [`BookingWizard`] owns the step graph, the session store and the external
//! capabilities the wizard needs. Every command for a session runs while that
//! session's lease is held, so commands for one session are applied strictly
//! one after another and a price lookup or submission can never be overtaken
//! by a later edit.
//!
//! Navigation commands (`next`, `previous`, `submit`) are handed to the step
//! graph. All other commands edit the draft in place and leave the current
//! step alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use wizard_flow::{Context, FlowRunner, GraphError, InMemorySessionStorage, Session};

use crate::addresses::{SavedAddress, apply_saved_address, derive_saved_addresses};
use crate::api::{BookingsApi, ServicesApi};
use crate::insurance::{InsuranceVerifier, set_insurance_enabled, update_insurance, verify_insurance};
use crate::location::{Coordinates, LocationService, merge_located_address};
use crate::models::{
    AddressDetails, BookingDraft, BookingOutcome, BookingType, CustomerDetails, InsuranceDetails,
    PaymentMethod, ScheduleDetails, ServiceSummary, WizardStep,
};
use crate::notifications::{Toast, ToastBus};
use crate::quote::{PriceEstimate, QuoteCache, estimate_price};
use crate::tasks::{NavigationCommand, session_keys};
use crate::validation::{FieldError, step_validity};
use crate::workflow::create_flow_runner;

pub const INSURANCE_VERIFIED_MESSAGE: &str = "Insurance verified";
pub const LOCATION_FILLED_MESSAGE: &str = "Address filled in from your location";

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Wizard session {0} not found")]
    NotFound(String),

    #[error("Wizard session {0} is already completed")]
    Completed(String),

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Engine(GraphError),
}

impl From<GraphError> for WizardError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::SessionNotFound(id) => Self::NotFound(id),
            GraphError::SessionCompleted(id) => Self::Completed(id),
            other => Self::Engine(other),
        }
    }
}

/// Field edits. Absent fields are left alone; present sub-records replace
/// the draft's copy wholesale.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftUpdate {
    pub service_id: Option<String>,
    pub category: Option<String>,
    pub booking_type: Option<BookingType>,
    pub schedule: Option<ScheduleDetails>,
    pub customer: Option<CustomerDetails>,
    pub address: Option<AddressDetails>,
    pub insurance: Option<InsuranceDetails>,
    pub payment_method: Option<PaymentMethod>,
    pub service_requirements: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WizardCommand {
    Update(DraftUpdate),
    Next,
    Previous,
    Submit,
    CalculatePrice,
    SetInsurance { enabled: bool },
    VerifyInsurance,
    ApplySavedAddress { key: String },
    UseLocation { latitude: f64, longitude: f64 },
}

impl WizardCommand {
    fn navigation(&self) -> Option<NavigationCommand> {
        match self {
            Self::Next => Some(NavigationCommand::Next),
            Self::Previous => Some(NavigationCommand::Previous),
            Self::Submit => Some(NavigationCommand::Submit),
            _ => None,
        }
    }
}

/// Everything a client needs to render the wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub session_id: String,
    pub step: u8,
    pub step_name: String,
    pub completed: bool,
    pub status_message: Option<String>,
    /// Response of the step that ran for this command, if one did
    pub response: Option<String>,
    pub draft: BookingDraft,
    pub field_errors: Vec<FieldError>,
    pub step_validity: [bool; 4],
    pub estimate: Option<PriceEstimate>,
    pub estimate_display: Option<String>,
    pub saved_addresses: Vec<SavedAddress>,
    pub outcome: Option<BookingOutcome>,
    pub toasts: Vec<Toast>,
}

/// The inputs a price estimate depends on
#[derive(PartialEq)]
struct PricingInputs {
    service_id: String,
    state: String,
    schedule: ScheduleDetails,
}

impl PricingInputs {
    fn of(draft: &BookingDraft) -> Self {
        Self {
            service_id: draft.service_id.trim().to_string(),
            state: draft.address.state.trim().to_string(),
            schedule: draft.schedule.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BookingWizard {
    runner: FlowRunner,
    services: Arc<dyn ServicesApi>,
    bookings: Arc<dyn BookingsApi>,
    verifier: Arc<dyn InsuranceVerifier>,
    location: Arc<LocationService>,
    toasts: Arc<ToastBus>,
}

impl BookingWizard {
    pub fn new(
        services: Arc<dyn ServicesApi>,
        bookings: Arc<dyn BookingsApi>,
        verifier: Arc<dyn InsuranceVerifier>,
        location: Arc<LocationService>,
        toasts: Arc<ToastBus>,
    ) -> Self {
        let runner = create_flow_runner(
            Arc::new(InMemorySessionStorage::new()),
            bookings.clone(),
            toasts.clone(),
        );
        Self {
            runner,
            services,
            bookings,
            verifier,
            location,
            toasts,
        }
    }

    pub fn services(&self) -> &Arc<dyn ServicesApi> {
        &self.services
    }

    pub fn toasts(&self) -> &Arc<ToastBus> {
        &self.toasts
    }

    /// Start a wizard on step 1 with an empty draft. The service catalogue
    /// and the customer's booking history are loaded up front; if either is
    /// unavailable the wizard carries on without it.
    pub async fn open(&self) -> Result<WizardView, WizardError> {
        let session_id = Uuid::new_v4().to_string();
        let session = self.runner.open(session_id.clone()).await?;
        let context = &session.context;

        context.set(session_keys::SESSION_ID, &session_id).await?;
        context
            .set(session_keys::DRAFT, BookingDraft::default())
            .await?;

        let catalogue = match self.services.get_unique_service_ids().await {
            Ok(catalogue) => catalogue,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "service catalogue unavailable");
                self.toasts.warning(Some(&session_id), e.user_message());
                Vec::<ServiceSummary>::new()
            }
        };
        context.set(session_keys::CATALOGUE, &catalogue).await?;

        let saved_addresses = match self.bookings.get_user_bookings().await {
            Ok(history) => derive_saved_addresses(&history),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "booking history unavailable");
                Vec::new()
            }
        };
        context
            .set(session_keys::SAVED_ADDRESSES, &saved_addresses)
            .await?;

        info!(
            session_id = %session_id,
            services = catalogue.len(),
            saved_addresses = saved_addresses.len(),
            "wizard session opened"
        );
        self.view(&session_id).await
    }

    pub async fn view(&self, session_id: &str) -> Result<WizardView, WizardError> {
        let lease = self.runner.acquire(session_id).await?;
        Ok(self.render(lease.session(), None))
    }

    /// Apply one command and return the resulting view. A session that
    /// completes is discarded once its final view has been rendered.
    pub async fn apply(
        &self,
        session_id: &str,
        command: WizardCommand,
    ) -> Result<WizardView, WizardError> {
        let mut lease = self.runner.acquire(session_id).await?;
        if lease.session().completed {
            return Err(WizardError::Completed(session_id.to_string()));
        }
        let context = lease.session().context.clone();

        let response = match command.navigation() {
            Some(navigation) => {
                context.set(session_keys::COMMAND, navigation).await?;
                let result = self.runner.step(&mut lease).await?;
                result.response
            }
            None => {
                self.edit(session_id, &context, command).await?;
                None
            }
        };

        let view = self.render(lease.session(), response);
        if view.completed {
            self.discard(session_id).await?;
            drop(lease);
        } else {
            self.runner.release(lease).await?;
        }
        Ok(view)
    }

    /// Abandon a wizard. Its draft and toasts are dropped and the session id
    /// stops resolving.
    pub async fn cancel(&self, session_id: &str) -> Result<(), WizardError> {
        let lease = self.runner.acquire(session_id).await?;
        self.discard(session_id).await?;
        drop(lease);
        Ok(())
    }

    async fn discard(&self, session_id: &str) -> Result<(), WizardError> {
        self.runner.forget(session_id).await?;
        self.toasts.clear_scope(session_id);
        info!(session_id = %session_id, "wizard session discarded");
        Ok(())
    }

    async fn edit(
        &self,
        session_id: &str,
        context: &Context,
        command: WizardCommand,
    ) -> Result<(), WizardError> {
        let mut draft: BookingDraft = context.get(session_keys::DRAFT).await.unwrap_or_default();
        let pricing_before = PricingInputs::of(&draft);

        match command {
            WizardCommand::Update(update) => apply_update(&mut draft, update)?,
            WizardCommand::CalculatePrice => {
                self.calculate_price(session_id, context, &draft).await?;
                return Ok(());
            }
            WizardCommand::SetInsurance { enabled } => set_insurance_enabled(&mut draft, enabled),
            WizardCommand::VerifyInsurance => {
                match verify_insurance(&mut draft, self.verifier.as_ref()).await {
                    Ok(()) => {
                        info!(session_id = %session_id, "insurance verified");
                        self.toasts
                            .success(Some(session_id), INSURANCE_VERIFIED_MESSAGE);
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "insurance verification failed");
                        self.toasts.error(Some(session_id), e.to_string());
                    }
                }
            }
            WizardCommand::ApplySavedAddress { key } => {
                let saved: Vec<SavedAddress> = context
                    .get(session_keys::SAVED_ADDRESSES)
                    .await
                    .unwrap_or_default();
                let address = saved
                    .iter()
                    .find(|address| address.key == key)
                    .ok_or_else(|| WizardError::Rejected(format!("Unknown saved address '{key}'")))?;
                apply_saved_address(&mut draft, address);
            }
            WizardCommand::UseLocation {
                latitude,
                longitude,
            } => {
                let coordinates = Coordinates::new(latitude, longitude)
                    .map_err(|e| WizardError::Rejected(e.to_string()))?;
                match self.location.address_at(coordinates).await {
                    Ok(located) => {
                        merge_located_address(&mut draft.address, located);
                        self.toasts.success(Some(session_id), LOCATION_FILLED_MESSAGE);
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "location lookup failed");
                        self.toasts.error(Some(session_id), e.to_string());
                    }
                }
            }
            WizardCommand::Next | WizardCommand::Previous | WizardCommand::Submit => {
                return Err(WizardError::Rejected(
                    "Navigation commands are handled by the wizard steps".to_string(),
                ));
            }
        }

        if PricingInputs::of(&draft) != pricing_before
            && context.remove(session_keys::ESTIMATE).await.is_some()
        {
            info!(session_id = %session_id, "draft changed, price estimate cleared");
        }
        context.set(session_keys::DRAFT, &draft).await?;
        Ok(())
    }

    async fn calculate_price(
        &self,
        session_id: &str,
        context: &Context,
        draft: &BookingDraft,
    ) -> Result<(), WizardError> {
        let mut cache: QuoteCache = context
            .get(session_keys::QUOTE_CACHE)
            .await
            .unwrap_or_default();

        match estimate_price(self.services.as_ref(), draft, &mut cache).await {
            Ok(estimate) => {
                if estimate.requires_quotation() {
                    self.toasts.info(
                        Some(session_id),
                        "No fixed price is available for this service. A quotation will be requested when you book.",
                    );
                } else {
                    self.toasts.success(
                        Some(session_id),
                        format!("Estimated price: {}", estimate.display_total()),
                    );
                }
                context.set(session_keys::ESTIMATE, &estimate).await?;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "price calculation failed");
                self.toasts.error(Some(session_id), e.user_message());
                context.remove(session_keys::ESTIMATE).await;
            }
        }
        context.set(session_keys::QUOTE_CACHE, &cache).await?;
        Ok(())
    }

    fn render(&self, session: &Session, response: Option<String>) -> WizardView {
        let context = &session.context;
        let draft: BookingDraft = context.get_sync(session_keys::DRAFT).unwrap_or_default();
        let catalogue: Vec<ServiceSummary> = context
            .get_sync(session_keys::CATALOGUE)
            .unwrap_or_default();
        let estimate: Option<PriceEstimate> = context.get_sync(session_keys::ESTIMATE);
        // the submission task is not a step of its own
        let step = WizardStep::from_task_id(&session.current_task_id).unwrap_or(WizardStep::Payment);

        WizardView {
            session_id: session.id.clone(),
            step: step.number(),
            step_name: step.title().to_string(),
            completed: session.completed,
            status_message: session.status_message.clone(),
            response,
            step_validity: step_validity(&draft, &catalogue),
            draft,
            field_errors: context
                .get_sync(session_keys::FIELD_ERRORS)
                .unwrap_or_default(),
            estimate_display: estimate.as_ref().map(PriceEstimate::display_total),
            estimate,
            saved_addresses: context
                .get_sync(session_keys::SAVED_ADDRESSES)
                .unwrap_or_default(),
            outcome: context.get_sync(session_keys::OUTCOME),
            toasts: self.toasts.active(Some(&session.id)),
        }
    }
}

fn apply_update(draft: &mut BookingDraft, update: DraftUpdate) -> Result<(), WizardError> {
    if let Some(service_id) = update.service_id {
        if service_id != draft.service_id {
            // category belongs to the previous service
            draft.category.clear();
        }
        draft.service_id = service_id;
    }
    if let Some(category) = update.category {
        draft.category = category;
    }
    if let Some(schedule) = update.schedule {
        draft.set_schedule(schedule);
    }
    if let Some(booking_type) = update.booking_type {
        draft.set_booking_type(booking_type);
    }
    if let Some(customer) = update.customer {
        draft.customer = customer;
    }
    if let Some(address) = update.address {
        draft.address = address;
    }
    if let Some(insurance) = update.insurance {
        update_insurance(draft, insurance).map_err(|e| WizardError::Rejected(e.to_string()))?;
    }
    if let Some(payment_method) = update.payment_method {
        draft.payment_method = Some(payment_method);
    }
    if let Some(requirements) = update.service_requirements {
        draft.service_requirements = requirements;
    }
    if let Some(notes) = update.notes {
        draft.notes = notes;
    }
    Ok(())
}
