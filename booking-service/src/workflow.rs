use std::sync::Arc;

use wizard_flow::{FlowRunner, Graph, GraphBuilder, SessionStorage, Task};

use crate::api::BookingsApi;
use crate::notifications::ToastBus;
use crate::tasks::*;

pub const WORKFLOW_ID: &str = "booking_wizard";

/// Service selection → customer information → schedule → payment →
/// submission. Backward moves and jumps come from the tasks themselves.
pub fn build_booking_workflow(bookings: Arc<dyn BookingsApi>, toasts: Arc<ToastBus>) -> Graph {
    let service_selection_task = Arc::new(ServiceSelectionTask::new(toasts.clone()));
    let service_selection_id = service_selection_task.id().to_string();

    let customer_information_task = Arc::new(CustomerInformationTask::new(toasts.clone()));
    let customer_information_id = customer_information_task.id().to_string();

    let schedule_task = Arc::new(ScheduleTask::new(toasts.clone()));
    let schedule_id = schedule_task.id().to_string();

    let payment_task = Arc::new(PaymentTask::new(toasts.clone()));
    let payment_id = payment_task.id().to_string();

    let submit_booking_task = Arc::new(SubmitBookingTask::new(bookings, toasts));
    let submit_booking_id = submit_booking_task.id().to_string();

    GraphBuilder::new(WORKFLOW_ID)
        .add_task(service_selection_task)
        .add_task(customer_information_task)
        .add_task(schedule_task)
        .add_task(payment_task)
        .add_task(submit_booking_task)
        .add_edge(&service_selection_id, &customer_information_id)
        .add_edge(&customer_information_id, &schedule_id)
        .add_edge(&schedule_id, &payment_id)
        .add_edge(&payment_id, &submit_booking_id)
        .build()
}

pub fn create_flow_runner(
    session_storage: Arc<dyn SessionStorage>,
    bookings: Arc<dyn BookingsApi>,
    toasts: Arc<ToastBus>,
) -> FlowRunner {
    let graph = Arc::new(build_booking_workflow(bookings, toasts));
    FlowRunner::new(graph, session_storage)
}
