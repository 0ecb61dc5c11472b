//! Price display and tariff-tier helpers.
//!
//! Prices are held as [`Decimal`] and formatted the en-AU way (`$1,234.50`).
//! Tariff tiers depend on the weekday of the visit and on whether it starts
//! at night; night always wins over the weekend tiers.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Key used at every level of a price table when nothing more specific exists
pub const DEFAULT_KEY: &str = "default";

/// Night tariff runs from 20:00 until 06:00
pub const NIGHT_STARTS_AT: u32 = 20;
pub const NIGHT_ENDS_AT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Regular,
    Saturday,
    Sunday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceCondition {
    Regular,
    Saturday,
    Sunday,
    Night,
}

impl PriceCondition {
    pub const ALL: [PriceCondition; 4] = [
        PriceCondition::Regular,
        PriceCondition::Saturday,
        PriceCondition::Sunday,
        PriceCondition::Night,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
            Self::Night => "night",
        }
    }
}

impl From<DayType> for PriceCondition {
    fn from(day: DayType) -> Self {
        match day {
            DayType::Regular => Self::Regular,
            DayType::Saturday => Self::Saturday,
            DayType::Sunday => Self::Sunday,
        }
    }
}

pub fn get_day_type(date: NaiveDate) -> DayType {
    match date.weekday() {
        Weekday::Sat => DayType::Saturday,
        Weekday::Sun => DayType::Sunday,
        _ => DayType::Regular,
    }
}

pub fn is_night_time(time: NaiveTime) -> bool {
    let hour = time.hour();
    hour >= NIGHT_STARTS_AT || hour < NIGHT_ENDS_AT
}

pub fn get_price_condition(date: NaiveDate, time: NaiveTime) -> PriceCondition {
    if is_night_time(time) {
        PriceCondition::Night
    } else {
        get_day_type(date).into()
    }
}

/// Prices of one service: condition → state → price, with [`DEFAULT_KEY`]
/// entries as fallbacks at both levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicePricing {
    #[serde(default)]
    pub conditions: BTreeMap<String, BTreeMap<String, Decimal>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

pub fn get_service_price(
    pricing: &ServicePricing,
    condition: PriceCondition,
    state: &str,
) -> Option<Decimal> {
    let by_state = |table: &BTreeMap<String, Decimal>| {
        table
            .get(state)
            .or_else(|| table.get(DEFAULT_KEY))
            .copied()
    };

    pricing
        .conditions
        .get(condition.as_str())
        .and_then(by_state)
        .or_else(|| pricing.conditions.get(DEFAULT_KEY).and_then(by_state))
}

pub fn get_price_range(pricing: &ServicePricing, state: &str) -> Option<PriceRange> {
    PriceCondition::ALL
        .iter()
        .filter_map(|condition| get_service_price(pricing, *condition, state))
        .fold(None, |range: Option<PriceRange>, price| {
            Some(match range {
                None => PriceRange {
                    min: price,
                    max: price,
                },
                Some(range) => PriceRange {
                    min: range.min.min(price),
                    max: range.max.max(price),
                },
            })
        })
}

pub fn format_price_range(range: Option<PriceRange>) -> String {
    match range {
        None => "Quote required".to_string(),
        Some(range) if range.min == range.max => format_aud(Some(range.min)),
        Some(range) => format!(
            "{} - {}",
            format_aud(Some(range.min)),
            format_aud(Some(range.max))
        ),
    }
}

/// Format an amount as Australian dollars. A missing amount shows as `$0.00`.
pub fn format_aud(amount: Option<Decimal>) -> String {
    let amount = amount
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.2}", amount.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    format!("{sign}${}.{cents}", group_thousands(whole))
}

/// [`format_aud`] for floating point input; NaN and infinities show as `$0.00`.
pub fn format_aud_f64(amount: f64) -> String {
    let amount = if amount.is_finite() {
        Decimal::from_f64(amount)
    } else {
        None
    };
    format_aud(amount)
}

fn group_thousands(whole: &str) -> String {
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
