//! Price estimation for a booking draft.
//!
//! One-time bookings cost `hourly × hours`. Date-range bookings cost
//! `visit days × hourly × hours`, where the visit days are the dates between
//! start and end (inclusive) whose weekday is one of the selected days.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ApiError, ServicesApi};
use crate::models::{BookingDraft, BookingType, ExactServiceQuote, ScheduleDetails};
use crate::pricing::{PriceCondition, format_aud, get_price_condition};
use crate::validation::MAX_SERVICE_HOURS;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Please select a service first")]
    MissingService,

    #[error("Please enter the state of the service address")]
    MissingState,

    #[error("Please select {0}")]
    MissingField(&'static str),

    #[error("The end date must be on or after the start date")]
    InvalidRange,

    #[error("None of the selected days fall between the start and end dates")]
    NoMatchingDays,

    #[error("Service hours cannot exceed {} per day", MAX_SERVICE_HOURS)]
    TooManyHours,

    #[error("The total for this booking is too large to calculate. Please request a quotation")]
    TotalTooLarge,

    #[error(transparent)]
    Lookup(#[from] ApiError),
}

impl PricingError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Lookup(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Everything the catalogue needs to resolve an exact service record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLookup {
    pub service_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub state: String,
}

impl PriceLookup {
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.service_id,
            self.date,
            self.time.format("%H:%M"),
            self.state
        )
    }
}

/// Check the draft has what a price lookup needs. Date-range bookings are
/// looked up on their start date.
pub fn price_lookup(draft: &BookingDraft) -> Result<PriceLookup, PricingError> {
    let service_id = draft.service_id.trim();
    if service_id.is_empty() {
        return Err(PricingError::MissingService);
    }
    let state = draft.address.state.trim();
    if state.is_empty() {
        return Err(PricingError::MissingState);
    }

    let schedule = &draft.schedule;
    let date = match schedule.booking_type {
        BookingType::OneTime => schedule
            .date
            .ok_or(PricingError::MissingField("a service date"))?,
        BookingType::DateRange => {
            let start = schedule
                .start_date
                .ok_or(PricingError::MissingField("a start date"))?;
            let end = schedule
                .end_date
                .ok_or(PricingError::MissingField("an end date"))?;
            if end < start {
                return Err(PricingError::InvalidRange);
            }
            if schedule.selected_days.is_empty() {
                return Err(PricingError::MissingField("at least one service day"));
            }
            start
        }
    };
    let time = schedule
        .time
        .ok_or(PricingError::MissingField("a start time"))?;
    positive_hours(schedule)?;

    Ok(PriceLookup {
        service_id: service_id.to_string(),
        date,
        time,
        state: state.to_string(),
    })
}

fn positive_hours(schedule: &ScheduleDetails) -> Result<Decimal, PricingError> {
    match schedule.service_hours {
        Some(hours) if hours > MAX_SERVICE_HOURS => Err(PricingError::TooManyHours),
        Some(hours) if hours > Decimal::ZERO => Ok(hours),
        _ => Err(PricingError::MissingField("the number of service hours")),
    }
}

/// Count the dates from `start` to `end` inclusive whose weekday index
/// (0 = Sunday) is in `days`.
pub fn count_matching_days(start: NaiveDate, end: NaiveDate, days: &BTreeSet<u8>) -> u32 {
    start
        .iter_days()
        .take_while(|date| *date <= end)
        .filter(|date| days.contains(&(date.weekday().num_days_from_sunday() as u8)))
        .count() as u32
}

/// Result of a price calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PriceEstimate {
    #[serde(rename_all = "camelCase")]
    Priced {
        quote: ExactServiceQuote,
        condition: PriceCondition,
        hourly_price: Decimal,
        service_hours: Decimal,
        billable_days: u32,
        total: Decimal,
    },
    /// No fixed price: submission will ask the provider for a quotation
    #[serde(rename_all = "camelCase")]
    QuotationRequired {
        quote: Option<ExactServiceQuote>,
        condition: PriceCondition,
    },
}

impl PriceEstimate {
    pub fn total(&self) -> Option<Decimal> {
        match self {
            Self::Priced { total, .. } => Some(*total),
            Self::QuotationRequired { .. } => None,
        }
    }

    pub fn hourly_price(&self) -> Option<Decimal> {
        match self {
            Self::Priced { hourly_price, .. } => Some(*hourly_price),
            Self::QuotationRequired { .. } => None,
        }
    }

    pub fn condition(&self) -> PriceCondition {
        match self {
            Self::Priced { condition, .. } | Self::QuotationRequired { condition, .. } => {
                *condition
            }
        }
    }

    pub fn quote(&self) -> Option<&ExactServiceQuote> {
        match self {
            Self::Priced { quote, .. } => Some(quote),
            Self::QuotationRequired { quote, .. } => quote.as_ref(),
        }
    }

    pub fn requires_quotation(&self) -> bool {
        matches!(self, Self::QuotationRequired { .. })
    }

    pub fn display_total(&self) -> String {
        match self.total() {
            Some(total) => format_aud(Some(total)),
            None => "Quote required".to_string(),
        }
    }
}

/// Turn the catalogue's answer into an estimate for the draft's schedule.
pub fn estimate_from_quote(
    schedule: &ScheduleDetails,
    lookup: &PriceLookup,
    quote: Option<ExactServiceQuote>,
) -> Result<PriceEstimate, PricingError> {
    let condition = get_price_condition(lookup.date, lookup.time);
    let hourly_price = quote.as_ref().and_then(ExactServiceQuote::hourly_price);
    let (quote, hourly_price) = match (quote, hourly_price) {
        (Some(quote), Some(price)) => (quote, price),
        (quote, _) => return Ok(PriceEstimate::QuotationRequired { quote, condition }),
    };

    let service_hours = positive_hours(schedule)?;
    let billable_days = match schedule.booking_type {
        BookingType::OneTime => 1,
        BookingType::DateRange => {
            let end = schedule
                .end_date
                .ok_or(PricingError::MissingField("an end date"))?;
            count_matching_days(lookup.date, end, &schedule.selected_days)
        }
    };
    if billable_days == 0 {
        return Err(PricingError::NoMatchingDays);
    }

    let total = Decimal::from(billable_days)
        .checked_mul(hourly_price)
        .and_then(|subtotal| subtotal.checked_mul(service_hours))
        .ok_or(PricingError::TotalTooLarge)?;
    Ok(PriceEstimate::Priced {
        quote,
        condition,
        hourly_price,
        service_hours,
        billable_days,
        total,
    })
}

/// Catalogue answers already fetched during one wizard session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteCache {
    entries: HashMap<String, Option<ExactServiceQuote>>,
}

impl QuoteCache {
    pub fn get(&self, lookup: &PriceLookup) -> Option<&Option<ExactServiceQuote>> {
        self.entries.get(&lookup.cache_key())
    }

    pub fn insert(&mut self, lookup: &PriceLookup, quote: Option<ExactServiceQuote>) {
        self.entries.insert(lookup.cache_key(), quote);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calculate the price of a draft, consulting the catalogue only for
/// lookups not already in `cache`.
pub async fn estimate_price(
    api: &dyn ServicesApi,
    draft: &BookingDraft,
    cache: &mut QuoteCache,
) -> Result<PriceEstimate, PricingError> {
    let lookup = price_lookup(draft)?;

    let quote = match cache.get(&lookup) {
        Some(hit) => {
            debug!(key = %lookup.cache_key(), "price lookup served from session cache");
            hit.clone()
        }
        None => {
            info!(
                service_id = %lookup.service_id,
                date = %lookup.date,
                state = %lookup.state,
                "looking up exact service price"
            );
            let fetched = api
                .find_service_by_id(&lookup.service_id, lookup.date, lookup.time, &lookup.state)
                .await?;
            cache.insert(&lookup, fetched.clone());
            fetched
        }
    };

    estimate_from_quote(&draft.schedule, &lookup, quote)
}
