#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use booking_service::api::{ApiError, BookingsApi, ServicesApi};
use booking_service::insurance::SimulatedVerifier;
use booking_service::location::{Coordinates, LocationError, LocationService, ReverseGeocoder};
use booking_service::models::{
    AddressDetails, BookingPayload, BookingRecord, BookingResponse, CustomerDetails,
    ExactServiceQuote, PaymentMethod, ScheduleDetails, ServiceSummary,
};
use booking_service::notifications::ToastBus;
use booking_service::wizard::{BookingWizard, DraftUpdate, WizardCommand};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};

pub const SERVICE_ID: &str = "01_011_0107_1_1";

pub struct FakeCatalogue {
    pub price: Option<Value>,
    pub lookups: AtomicUsize,
}

#[async_trait]
impl ServicesApi for FakeCatalogue {
    async fn get_unique_service_ids(&self) -> Result<Vec<ServiceSummary>, ApiError> {
        Ok(vec![ServiceSummary {
            service_id: SERVICE_ID.to_string(),
            name: "Assistance With Self-Care Activities".to_string(),
            category: "Daily Activities".to_string(),
            unit: Some("H".to_string()),
            quote: false,
            service_type: None,
        }])
    }

    async fn find_service_by_id(
        &self,
        service_id: &str,
        _date: NaiveDate,
        _time: NaiveTime,
        _state: &str,
    ) -> Result<Option<ExactServiceQuote>, ApiError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if service_id != SERVICE_ID {
            return Ok(None);
        }
        Ok(Some(ExactServiceQuote {
            support_item_number: SERVICE_ID.to_string(),
            support_item_name: "Assistance With Self-Care Activities".to_string(),
            condition: Some("regular".to_string()),
            unit: Some("H".to_string()),
            price: self.price.clone(),
            price_type: None,
            quote_required: false,
        }))
    }
}

/// How the fake bookings API answers a submission
#[derive(Clone)]
pub enum Answer {
    Book,
    Quote,
    Reject(String),
    Offline,
}

pub struct FakeBookings {
    pub answer: Mutex<Answer>,
    pub history: Vec<BookingRecord>,
    pub submitted: Mutex<Vec<BookingPayload>>,
}

#[async_trait]
impl BookingsApi for FakeBookings {
    async fn get_user_bookings(&self) -> Result<Vec<BookingRecord>, ApiError> {
        Ok(self.history.clone())
    }

    async fn create_booking(&self, payload: &BookingPayload) -> Result<BookingResponse, ApiError> {
        self.submitted.lock().unwrap().push(payload.clone());
        let answer = self.answer.lock().unwrap().clone();
        match answer {
            Answer::Book => Ok(BookingResponse {
                success: true,
                booking: Some(json!({ "id": "bk-1" })),
                requires_quotation: false,
                quotation: None,
                message: None,
            }),
            Answer::Quote => Ok(BookingResponse {
                success: true,
                booking: None,
                requires_quotation: true,
                quotation: Some(json!({ "id": "qt-1" })),
                message: None,
            }),
            Answer::Reject(message) => Ok(BookingResponse {
                success: false,
                booking: None,
                requires_quotation: false,
                quotation: None,
                message: Some(message),
            }),
            Answer::Offline => Err(ApiError::Network("connection refused".to_string())),
        }
    }
}

pub struct FixedGeocoder;

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn reverse(&self, _coordinates: Coordinates) -> Result<AddressDetails, LocationError> {
        Ok(AddressDetails {
            house_details: String::new(),
            address: "1 Macquarie Street".to_string(),
            city: "Sydney".to_string(),
            state: "NSW".to_string(),
            pincode: "2000".to_string(),
        })
    }
}

pub struct Harness {
    pub wizard: BookingWizard,
    pub catalogue: Arc<FakeCatalogue>,
    pub bookings: Arc<FakeBookings>,
    pub toasts: Arc<ToastBus>,
}

impl Harness {
    pub fn new(price: Option<Value>, answer: Answer) -> Self {
        Self::with_history(price, answer, Vec::new())
    }

    pub fn with_history(price: Option<Value>, answer: Answer, history: Vec<BookingRecord>) -> Self {
        let catalogue = Arc::new(FakeCatalogue {
            price,
            lookups: AtomicUsize::new(0),
        });
        let bookings = Arc::new(FakeBookings {
            answer: Mutex::new(answer),
            history,
            submitted: Mutex::new(Vec::new()),
        });
        let toasts = ToastBus::with_default_duration(None);
        let wizard = BookingWizard::new(
            catalogue.clone(),
            bookings.clone(),
            Arc::new(SimulatedVerifier::new(Duration::ZERO)),
            Arc::new(LocationService::new(Arc::new(FixedGeocoder))),
            toasts.clone(),
        );
        Self {
            wizard,
            catalogue,
            bookings,
            toasts,
        }
    }

    pub fn submitted(&self) -> Vec<BookingPayload> {
        self.bookings.submitted.lock().unwrap().clone()
    }

    pub fn toast_messages(&self, session_id: &str) -> Vec<String> {
        self.toasts
            .active(Some(session_id))
            .into_iter()
            .map(|toast| toast.message)
            .collect()
    }
}

pub fn select_service() -> WizardCommand {
    WizardCommand::Update(DraftUpdate {
        service_id: Some(SERVICE_ID.to_string()),
        ..Default::default()
    })
}

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        name: "Sam Taylor".to_string(),
        age: Some(42),
        phone: "0400 111 222".to_string(),
        emergency_contact: "0411222333".to_string(),
    }
}

pub fn address() -> AddressDetails {
    AddressDetails {
        house_details: "Unit 4".to_string(),
        address: "200 George Street".to_string(),
        city: "Sydney".to_string(),
        state: "NSW".to_string(),
        pincode: "2000".to_string(),
    }
}

pub fn fill_customer() -> WizardCommand {
    WizardCommand::Update(DraftUpdate {
        customer: Some(customer()),
        address: Some(address()),
        ..Default::default()
    })
}

/// Monday 2025-03-10, 10:00, two hours
pub fn one_time_schedule(hours: i64) -> WizardCommand {
    WizardCommand::Update(DraftUpdate {
        schedule: Some(ScheduleDetails {
            date: NaiveDate::from_ymd_opt(2025, 3, 10),
            time: NaiveTime::from_hms_opt(10, 0, 0),
            service_hours: Some(Decimal::from(hours)),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn pay_by_card() -> WizardCommand {
    WizardCommand::Update(DraftUpdate {
        payment_method: Some(PaymentMethod::Card),
        ..Default::default()
    })
}

pub fn past_booking(id: &str, day: u32, street: &str) -> BookingRecord {
    BookingRecord {
        id: id.to_string(),
        created_at: Some(Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap()),
        customer_name: Some("Sam Taylor".to_string()),
        customer_phone: Some("0400111222".to_string()),
        address: Some(street_only(street)),
    }
}

fn street_only(street: &str) -> AddressDetails {
    AddressDetails {
        address: street.to_string(),
        ..address()
    }
}

/// Open a session and walk it to the payment step with every earlier step
/// valid. Returns the session id.
pub async fn walk_to_payment(harness: &Harness) -> String {
    let wizard = &harness.wizard;
    let session_id = wizard.open().await.unwrap().session_id;
    for command in [
        select_service(),
        WizardCommand::Next,
        fill_customer(),
        WizardCommand::Next,
        one_time_schedule(2),
        WizardCommand::Next,
    ] {
        wizard.apply(&session_id, command).await.unwrap();
    }
    session_id
}
