use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};
use wizard_flow::{Context, NextAction, Result, Task, TaskResult};

use super::navigation::step_status;
use super::session_keys;
use crate::api::BookingsApi;
use crate::models::{BookingDraft, BookingOutcome, BookingPayload, WizardStep};
use crate::notifications::ToastBus;
use crate::quote::PriceEstimate;

pub const BOOKED_MESSAGE: &str = "Booking created successfully";
pub const QUOTATION_MESSAGE: &str =
    "Quotation request submitted. We will be in touch with a price shortly.";
const REJECTED_MESSAGE: &str = "The booking could not be created. Please try again.";

pub const TASK_ID: &str = "submit_booking";

/// Assemble the body sent to the bookings API
pub fn build_payload(draft: &BookingDraft, estimate: Option<&PriceEstimate>) -> BookingPayload {
    let schedule = &draft.schedule;
    BookingPayload {
        service_id: draft.service_id.trim().to_string(),
        category: draft.category.clone(),
        booking_type: schedule.booking_type,
        date: schedule.date,
        time: schedule.time,
        service_hours: schedule.service_hours,
        start_date: schedule.start_date,
        end_date: schedule.end_date,
        selected_days: schedule.selected_days.iter().copied().collect(),
        customer: draft.customer.clone(),
        address: draft.address.clone(),
        insurance: draft.insurance.clone().filter(|_| draft.use_insurance),
        payment_method: draft.payment_method,
        service_requirements: draft.service_requirements.clone(),
        notes: draft.notes.clone(),
        price_condition: estimate.map(PriceEstimate::condition),
        support_item_number: estimate
            .and_then(PriceEstimate::quote)
            .map(|quote| quote.support_item_number.clone()),
        hourly_price: estimate.and_then(PriceEstimate::hourly_price),
        total_price: estimate.and_then(PriceEstimate::total),
        requires_quotation: estimate.is_some_and(PriceEstimate::requires_quotation),
    }
}

/// Sends the finished draft to the bookings API. Success ends the session;
/// any failure puts it back on the payment step.
pub struct SubmitBookingTask {
    bookings: Arc<dyn BookingsApi>,
    toasts: Arc<ToastBus>,
}

impl SubmitBookingTask {
    pub fn new(bookings: Arc<dyn BookingsApi>, toasts: Arc<ToastBus>) -> Self {
        Self { bookings, toasts }
    }

    fn back_to_payment(&self, session_id: &str, message: String) -> TaskResult {
        self.toasts.error(Some(session_id), message);
        TaskResult::new_with_status(
            Some(WizardStep::Payment.title().to_string()),
            NextAction::GoTo(WizardStep::Payment.task_id().to_string()),
            Some(step_status(WizardStep::Payment)),
        )
    }
}

#[async_trait]
impl Task for SubmitBookingTask {
    fn id(&self) -> &str {
        TASK_ID
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let session_id = context
            .get::<String>(session_keys::SESSION_ID)
            .await
            .unwrap_or_else(|| "unknown".to_string());
        let draft: BookingDraft = context.get(session_keys::DRAFT).await.unwrap_or_default();
        let estimate: Option<PriceEstimate> = context.get(session_keys::ESTIMATE).await;

        let payload = build_payload(&draft, estimate.as_ref());
        info!(
            session_id = %session_id,
            service_id = %payload.service_id,
            requires_quotation = payload.requires_quotation,
            "creating booking"
        );

        let response = match self.bookings.create_booking(&payload).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    session_id = %session_id,
                    error = %e,
                    network = e.is_network(),
                    "booking request failed"
                );
                return Ok(self.back_to_payment(&session_id, e.user_message()));
            }
        };

        if !response.success {
            let message = response
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| REJECTED_MESSAGE.to_string());
            warn!(session_id = %session_id, message = %message, "booking rejected");
            return Ok(self.back_to_payment(&session_id, message));
        }

        let outcome = if response.requires_quotation {
            BookingOutcome::QuotationRequested {
                quotation: response.quotation.unwrap_or(Value::Null),
                message: response
                    .message
                    .unwrap_or_else(|| QUOTATION_MESSAGE.to_string()),
            }
        } else {
            BookingOutcome::Booked {
                booking: response.booking.unwrap_or(Value::Null),
                message: BOOKED_MESSAGE.to_string(),
            }
        };
        let message = match &outcome {
            BookingOutcome::Booked { message, .. }
            | BookingOutcome::QuotationRequested { message, .. } => message.clone(),
        };

        info!(session_id = %session_id, "booking submitted");
        self.toasts.success(Some(&session_id), message.clone());
        context.set(session_keys::OUTCOME, &outcome).await?;

        Ok(TaskResult::new_with_status(
            Some(message),
            NextAction::End,
            Some("Booking submitted".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExactServiceQuote, InsuranceDetails, ScheduleDetails};
    use crate::pricing::PriceCondition;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn quote() -> ExactServiceQuote {
        ExactServiceQuote {
            support_item_number: "01_011_0107_1_1".into(),
            support_item_name: "Assistance With Self-Care Activities".into(),
            condition: Some("regular".into()),
            unit: Some("H".into()),
            price: Some(serde_json::json!(500)),
            price_type: None,
            quote_required: false,
        }
    }

    #[test]
    fn payload_carries_computed_price() {
        let mut draft = BookingDraft {
            service_id: " svc-1 ".into(),
            ..Default::default()
        };
        draft.set_schedule(ScheduleDetails {
            date: NaiveDate::from_ymd_opt(2025, 3, 10),
            service_hours: Some(dec!(2)),
            selected_days: BTreeSet::from([1]),
            ..Default::default()
        });
        let estimate = PriceEstimate::Priced {
            quote: quote(),
            condition: PriceCondition::Regular,
            hourly_price: dec!(500),
            service_hours: dec!(2),
            billable_days: 1,
            total: dec!(1000),
        };

        let payload = build_payload(&draft, Some(&estimate));

        assert_eq!(payload.service_id, "svc-1");
        assert_eq!(payload.total_price, Some(dec!(1000)));
        assert_eq!(payload.support_item_number.as_deref(), Some("01_011_0107_1_1"));
        assert!(payload.selected_days.is_empty());
        assert!(!payload.requires_quotation);
    }

    #[test]
    fn payload_without_estimate_has_no_price() {
        let draft = BookingDraft {
            use_insurance: false,
            insurance: Some(InsuranceDetails::default()),
            ..Default::default()
        };

        let payload = build_payload(&draft, None);

        assert_eq!(payload.total_price, None);
        assert_eq!(payload.price_condition, None);
        assert_eq!(payload.insurance, None);
        assert!(!payload.requires_quotation);
    }
}
