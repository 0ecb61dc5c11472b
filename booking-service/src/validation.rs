//! Step validation for the booking wizard.
//!
//! [`validate_step`] is the only place a step's rules live. `Next`, `Submit`
//! and the step-validity flags reported to clients all call it.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{BookingDraft, BookingType, ServiceSummary, WizardStep};

pub const MIN_AGE: u32 = 1;
pub const MAX_AGE: u32 = 120;
/// Longest visit that can be booked for a single day
pub const MAX_SERVICE_HOURS: Decimal = Decimal::from_parts(24, 0, 0, false, 0);

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("phone pattern is valid"));
static PINCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4,6}$").expect("pincode pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// All field errors of `step` for the current draft. Empty means the step is
/// valid. `catalogue` may be empty when it could not be loaded, in which case
/// any service id is accepted.
pub fn validate_step(
    step: WizardStep,
    draft: &BookingDraft,
    catalogue: &[ServiceSummary],
) -> Vec<FieldError> {
    match step {
        WizardStep::ServiceSelection => validate_service(draft, catalogue),
        WizardStep::CustomerInformation => validate_customer(draft),
        WizardStep::Schedule => validate_schedule(draft),
        WizardStep::Payment => validate_payment(draft),
    }
}

/// First step, in wizard order, that does not validate
pub fn first_invalid_step(
    draft: &BookingDraft,
    catalogue: &[ServiceSummary],
) -> Option<(WizardStep, Vec<FieldError>)> {
    WizardStep::ALL.into_iter().find_map(|step| {
        let errors = validate_step(step, draft, catalogue);
        (!errors.is_empty()).then_some((step, errors))
    })
}

pub fn step_validity(draft: &BookingDraft, catalogue: &[ServiceSummary]) -> [bool; 4] {
    WizardStep::ALL.map(|step| validate_step(step, draft, catalogue).is_empty())
}

fn validate_service(draft: &BookingDraft, catalogue: &[ServiceSummary]) -> Vec<FieldError> {
    if blank(&draft.service_id) {
        return vec![FieldError::new("serviceId", "Please select a service")];
    }
    let known = catalogue.is_empty()
        || catalogue
            .iter()
            .any(|service| service.service_id == draft.service_id.trim());
    if known {
        Vec::new()
    } else {
        vec![FieldError::new(
            "serviceId",
            "The selected service is no longer available",
        )]
    }
}

fn validate_customer(draft: &BookingDraft) -> Vec<FieldError> {
    let customer = &draft.customer;
    let address = &draft.address;
    let mut errors = Vec::new();

    if blank(&customer.name) {
        errors.push(FieldError::new("customer.name", "Name is required"));
    }
    match customer.age {
        None => errors.push(FieldError::new("customer.age", "Age is required")),
        Some(age) if !(MIN_AGE..=MAX_AGE).contains(&age) => errors.push(FieldError::new(
            "customer.age",
            format!("Age must be between {MIN_AGE} and {MAX_AGE}"),
        )),
        Some(_) => {}
    }
    for (field, label, value) in [
        ("customer.phone", "Phone number", &customer.phone),
        (
            "customer.emergencyContact",
            "Emergency contact",
            &customer.emergency_contact,
        ),
    ] {
        if blank(value) {
            errors.push(FieldError::new(field, format!("{label} is required")));
        } else if !PHONE.is_match(&strip_whitespace(value)) {
            errors.push(FieldError::new(
                field,
                format!("{label} must be exactly 10 digits"),
            ));
        }
    }

    for (field, label, value) in [
        ("address.houseDetails", "House details", &address.house_details),
        ("address.address", "Street address", &address.address),
        ("address.city", "City", &address.city),
        ("address.state", "State", &address.state),
    ] {
        if blank(value) {
            errors.push(FieldError::new(field, format!("{label} is required")));
        }
    }
    if blank(&address.pincode) {
        errors.push(FieldError::new("address.pincode", "Pincode is required"));
    } else if !PINCODE.is_match(address.pincode.trim()) {
        errors.push(FieldError::new(
            "address.pincode",
            "Pincode must be 4 to 6 digits",
        ));
    }

    errors
}

fn validate_schedule(draft: &BookingDraft) -> Vec<FieldError> {
    let schedule = &draft.schedule;
    let mut errors = Vec::new();

    match schedule.booking_type {
        BookingType::OneTime => {
            if schedule.date.is_none() {
                errors.push(FieldError::new("schedule.date", "Please select a date"));
            }
        }
        BookingType::DateRange => {
            if schedule.start_date.is_none() {
                errors.push(FieldError::new(
                    "schedule.startDate",
                    "Please select a start date",
                ));
            }
            match (schedule.start_date, schedule.end_date) {
                (_, None) => errors.push(FieldError::new(
                    "schedule.endDate",
                    "Please select an end date",
                )),
                (Some(start), Some(end)) if end < start => errors.push(FieldError::new(
                    "schedule.endDate",
                    "End date must be on or after the start date",
                )),
                _ => {}
            }
            if schedule.selected_days.is_empty() {
                errors.push(FieldError::new(
                    "schedule.selectedDays",
                    "Please select at least one day",
                ));
            }
        }
    }
    if schedule.time.is_none() {
        errors.push(FieldError::new("schedule.time", "Please select a time"));
    }
    match schedule.service_hours {
        Some(hours) if hours > MAX_SERVICE_HOURS => errors.push(FieldError::new(
            "schedule.serviceHours",
            format!("Service hours cannot exceed {MAX_SERVICE_HOURS} per day"),
        )),
        Some(hours) if hours > Decimal::ZERO => {}
        _ => errors.push(FieldError::new(
            "schedule.serviceHours",
            "Service hours must be greater than zero",
        )),
    }

    errors
}

fn validate_payment(draft: &BookingDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if draft.payment_method.is_none() {
        errors.push(FieldError::new(
            "paymentMethod",
            "Please choose a payment method",
        ));
    }
    if draft.use_insurance {
        match &draft.insurance {
            None => errors.push(FieldError::new(
                "insurance",
                "Please enter your insurance details",
            )),
            Some(insurance) => {
                for (field, label, value) in [
                    ("insurance.provider", "Insurance provider", &insurance.provider),
                    ("insurance.policyNumber", "Policy number", &insurance.policy_number),
                    ("insurance.memberId", "Member ID", &insurance.member_id),
                ] {
                    if blank(value) {
                        errors.push(FieldError::new(field, format!("{label} is required")));
                    }
                }
                if !insurance.verified {
                    errors.push(FieldError::new(
                        "insurance.verified",
                        "Please verify your insurance before submitting",
                    ));
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{InsuranceDetails, PaymentMethod, ScheduleDetails};

    fn catalogue() -> Vec<ServiceSummary> {
        vec![ServiceSummary {
            service_id: "01_011_0107_1_1".into(),
            name: "Personal care".into(),
            category: "Daily Activities".into(),
            unit: Some("H".into()),
            quote: false,
            service_type: None,
        }]
    }

    fn complete_draft() -> BookingDraft {
        let mut draft = BookingDraft {
            service_id: "01_011_0107_1_1".into(),
            category: "Daily Activities".into(),
            payment_method: Some(PaymentMethod::Card),
            ..Default::default()
        };
        draft.customer.name = "Jordan Lee".into();
        draft.customer.age = Some(67);
        draft.customer.phone = "0412 345 678".into();
        draft.customer.emergency_contact = "0298765432".into();
        draft.address.house_details = "Unit 4".into();
        draft.address.address = "12 George St".into();
        draft.address.city = "Sydney".into();
        draft.address.state = "NSW".into();
        draft.address.pincode = "2000".into();
        draft.set_schedule(ScheduleDetails {
            booking_type: BookingType::OneTime,
            date: NaiveDate::from_ymd_opt(2025, 3, 10),
            time: NaiveTime::from_hms_opt(10, 0, 0),
            service_hours: Some(dec!(2)),
            ..Default::default()
        });
        draft
    }

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn complete_draft_passes_every_step() {
        let draft = complete_draft();

        assert_eq!(step_validity(&draft, &catalogue()), [true; 4]);
        assert_eq!(first_invalid_step(&draft, &catalogue()), None);
    }

    #[test]
    fn service_step_needs_a_known_service() {
        let mut draft = complete_draft();
        draft.service_id = "missing".into();

        let errors = validate_step(WizardStep::ServiceSelection, &draft, &catalogue());
        assert_eq!(fields(&errors), vec!["serviceId"]);

        // without a catalogue any id is accepted
        assert!(validate_step(WizardStep::ServiceSelection, &draft, &[]).is_empty());
    }

    #[test]
    fn customer_step_checks_schema() {
        let mut draft = complete_draft();
        draft.customer.age = Some(0);
        draft.customer.phone = "12345".into();
        draft.address.pincode = "20a0".into();
        draft.address.city = "   ".into();

        let errors = validate_step(WizardStep::CustomerInformation, &draft, &[]);

        assert_eq!(
            fields(&errors),
            vec!["customer.age", "customer.phone", "address.city", "address.pincode"]
        );
        assert_eq!(errors[0].message, "Age must be between 1 and 120");
    }

    #[test]
    fn customer_step_accepts_age_bounds() {
        let mut draft = complete_draft();
        for age in [1, 120] {
            draft.customer.age = Some(age);
            assert!(validate_step(WizardStep::CustomerInformation, &draft, &[]).is_empty());
        }
        draft.customer.age = Some(121);
        assert!(!validate_step(WizardStep::CustomerInformation, &draft, &[]).is_empty());
    }

    #[test]
    fn one_time_schedule_needs_date_time_and_hours() {
        let mut draft = complete_draft();
        draft.set_schedule(ScheduleDetails::default());

        let errors = validate_step(WizardStep::Schedule, &draft, &[]);

        assert_eq!(
            fields(&errors),
            vec!["schedule.date", "schedule.time", "schedule.serviceHours"]
        );
    }

    #[test]
    fn range_schedule_needs_days_and_ordered_dates() {
        let mut draft = complete_draft();
        draft.set_schedule(ScheduleDetails {
            booking_type: BookingType::DateRange,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 16),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 3),
            time: NaiveTime::from_hms_opt(9, 0, 0),
            service_hours: Some(dec!(3)),
            selected_days: BTreeSet::new(),
            ..Default::default()
        });

        let errors = validate_step(WizardStep::Schedule, &draft, &[]);

        assert_eq!(
            fields(&errors),
            vec!["schedule.endDate", "schedule.selectedDays"]
        );
    }

    #[test]
    fn payment_step_requires_verified_insurance_when_enabled() {
        let mut draft = complete_draft();
        draft.use_insurance = true;
        draft.insurance = Some(InsuranceDetails {
            provider: "Medibank".into(),
            policy_number: "P-1".into(),
            member_id: "M-1".into(),
            ..Default::default()
        });

        let errors = validate_step(WizardStep::Payment, &draft, &[]);
        assert_eq!(fields(&errors), vec!["insurance.verified"]);

        if let Some(insurance) = draft.insurance.as_mut() {
            insurance.verified = true;
        }
        assert!(validate_step(WizardStep::Payment, &draft, &[]).is_empty());
    }

    #[test]
    fn first_invalid_step_follows_wizard_order() {
        let mut draft = complete_draft();
        draft.payment_method = None;
        draft.customer.name.clear();

        let (step, errors) = first_invalid_step(&draft, &catalogue()).unwrap();

        assert_eq!(step, WizardStep::CustomerInformation);
        assert_eq!(fields(&errors), vec!["customer.name"]);
        assert_eq!(step_validity(&draft, &catalogue()), [true, false, true, false]);
    }

    #[test]
    fn service_hours_are_capped_per_day() {
        let mut draft = complete_draft();
        draft.schedule.service_hours = Some(MAX_SERVICE_HOURS);
        assert!(validate_step(WizardStep::Schedule, &draft, &[]).is_empty());

        draft.schedule.service_hours = Some(Decimal::MAX);
        let errors = validate_step(WizardStep::Schedule, &draft, &[]);

        assert_eq!(fields(&errors), vec!["schedule.serviceHours"]);
        assert_eq!(errors[0].message, "Service hours cannot exceed 24 per day");
    }

    #[test]
    fn only_ascii_digits_count() {
        let mut draft = complete_draft();
        // Arabic-Indic and full-width digits
        draft.customer.phone = "\u{0660}\u{0661}\u{0662}\u{0663}\u{0664}\u{0665}\u{0666}\u{0667}\u{0668}\u{0669}".into();
        draft.address.pincode = "\u{FF12}\u{FF10}\u{FF10}\u{FF10}".into();

        let errors = validate_step(WizardStep::CustomerInformation, &draft, &[]);

        assert_eq!(fields(&errors), vec!["customer.phone", "address.pincode"]);
    }
}
