use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pricing::PriceCondition;

/// The four screens of the booking wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    ServiceSelection,
    CustomerInformation,
    Schedule,
    Payment,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::ServiceSelection,
        WizardStep::CustomerInformation,
        WizardStep::Schedule,
        WizardStep::Payment,
    ];

    /// 1-based position in the wizard
    pub fn number(self) -> u8 {
        match self {
            Self::ServiceSelection => 1,
            Self::CustomerInformation => 2,
            Self::Schedule => 3,
            Self::Payment => 4,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ServiceSelection => "Service Selection",
            Self::CustomerInformation => "Customer Information",
            Self::Schedule => "Schedule",
            Self::Payment => "Payment",
        }
    }

    /// Id of the graph task that renders this step
    pub fn task_id(self) -> &'static str {
        match self {
            Self::ServiceSelection => "service_selection",
            Self::CustomerInformation => "customer_information",
            Self::Schedule => "schedule",
            Self::Payment => "payment",
        }
    }

    pub fn from_task_id(task_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.task_id() == task_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingType {
    #[default]
    OneTime,
    DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Qr,
    Upi,
    Card,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerDetails {
    pub name: String,
    pub age: Option<u32>,
    pub phone: String,
    pub emergency_contact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressDetails {
    pub house_details: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// When and for how long the service is needed.
///
/// `date` belongs to one-time bookings; `start_date`, `end_date` and
/// `selected_days` belong to date-range bookings. `time` and `service_hours`
/// apply to both (hours are per visit day for ranges).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleDetails {
    pub booking_type: BookingType,
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm")]
    pub time: Option<NaiveTime>,
    pub service_hours: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Weekday indices, 0 = Sunday
    pub selected_days: BTreeSet<u8>,
}

impl ScheduleDetails {
    /// Drop the fields of whichever booking type is not selected, and any
    /// weekday index outside 0..=6.
    pub fn normalized(mut self) -> Self {
        match self.booking_type {
            BookingType::OneTime => {
                self.start_date = None;
                self.end_date = None;
                self.selected_days.clear();
            }
            BookingType::DateRange => {
                self.date = None;
                self.selected_days.retain(|day| *day <= 6);
            }
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsuranceDetails {
    pub provider: String,
    pub policy_number: String,
    pub member_id: String,
    pub group_number: String,
    pub verified: bool,
}

/// Everything the wizard collects before submitting a booking. Lives only in
/// the wizard session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingDraft {
    pub service_id: String,
    pub category: String,
    pub schedule: ScheduleDetails,
    pub customer: CustomerDetails,
    pub address: AddressDetails,
    pub use_insurance: bool,
    pub insurance: Option<InsuranceDetails>,
    pub payment_method: Option<PaymentMethod>,
    pub service_requirements: String,
    pub notes: String,
}

impl BookingDraft {
    pub fn set_schedule(&mut self, schedule: ScheduleDetails) {
        self.schedule = schedule.normalized();
    }

    /// Switch booking type, clearing the dates of the other type
    pub fn set_booking_type(&mut self, booking_type: BookingType) {
        let mut schedule = std::mem::take(&mut self.schedule);
        schedule.booking_type = booking_type;
        self.set_schedule(schedule);
    }
}

/// Catalogue entry returned by the services API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub service_id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub quote: bool,
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,
}

/// Priced, condition-specific service record for one date/time/state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactServiceQuote {
    pub support_item_number: String,
    #[serde(default)]
    pub support_item_name: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Kept raw: the catalogue sends numbers, numeric strings or nothing
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub price_type: Option<String>,
    #[serde(default, alias = "quote")]
    pub quote_required: bool,
}

impl ExactServiceQuote {
    /// Hourly price when the record carries a usable positive number.
    pub fn hourly_price(&self) -> Option<Decimal> {
        if self.quote_required {
            return None;
        }
        let price = match self.price.as_ref()? {
            Value::Number(number) => {
                let raw = number.to_string();
                Decimal::from_str(&raw)
                    .or_else(|_| Decimal::from_scientific(&raw))
                    .ok()?
            }
            Value::String(raw) => Decimal::from_str(raw.trim()).ok()?,
            _ => return None,
        };
        (price > Decimal::ZERO).then_some(price)
    }
}

/// A past booking as returned by the bookings API; only the parts used to
/// rebuild saved addresses are modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRecord {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<AddressDetails>,
}

/// Body sent to the bookings API on submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPayload {
    pub service_id: String,
    pub category: String,
    pub booking_type: BookingType,
    pub date: Option<NaiveDate>,
    #[serde(with = "hhmm")]
    pub time: Option<NaiveTime>,
    pub service_hours: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub selected_days: Vec<u8>,
    pub customer: CustomerDetails,
    pub address: AddressDetails,
    pub insurance: Option<InsuranceDetails>,
    pub payment_method: Option<PaymentMethod>,
    pub service_requirements: String,
    pub notes: String,
    pub price_condition: Option<PriceCondition>,
    pub support_item_number: Option<String>,
    pub hourly_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub requires_quotation: bool,
}

/// Answer of the bookings API to a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub success: bool,
    #[serde(default)]
    pub booking: Option<Value>,
    #[serde(default)]
    pub requires_quotation: bool,
    #[serde(default)]
    pub quotation: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// How a successful submission ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BookingOutcome {
    Booked { booking: Value, message: String },
    QuotationRequested { quotation: Value, message: String },
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// `HH:MM` wire format for optional times
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&time.format("%H:%M").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => super::parse_time(value)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid time '{value}', expected HH:MM"))),
        }
    }
}
