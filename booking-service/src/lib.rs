pub mod addresses;
pub mod api;
pub mod config;
pub mod insurance;
pub mod location;
pub mod models;
pub mod notifications;
pub mod pricing;
pub mod quote;
pub mod service;
pub mod tasks;
pub mod validation;
pub mod wizard;
pub mod workflow;

pub use wizard::{BookingWizard, WizardCommand, WizardError, WizardView};
