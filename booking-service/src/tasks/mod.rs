// Booking wizard steps
pub mod customer_information;
pub mod payment;
pub mod schedule;
pub mod service_selection;
pub mod submit_booking;

// Shared modules
mod navigation;
pub mod types;

pub use customer_information::CustomerInformationTask;
pub use payment::PaymentTask;
pub use schedule::ScheduleTask;
pub use service_selection::ServiceSelectionTask;
pub use submit_booking::SubmitBookingTask;

pub use types::{NavigationCommand, session_keys};
