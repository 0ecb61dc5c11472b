use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AddressDetails, BookingDraft, BookingRecord};

/// An address the customer has booked at before
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    pub key: String,
    pub address: AddressDetails,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
    pub is_default: bool,
}

/// Dedup key: street, city, state and pincode, case and whitespace
/// insensitive
pub fn address_key(address: &AddressDetails) -> String {
    [
        &address.address,
        &address.city,
        &address.state,
        &address.pincode,
    ]
    .iter()
    .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
    .collect::<Vec<_>>()
    .join("|")
}

/// Distinct addresses from booking history, most recent first. The most
/// recent one is the default.
pub fn derive_saved_addresses(history: &[BookingRecord]) -> Vec<SavedAddress> {
    let mut records: Vec<&BookingRecord> = history
        .iter()
        .filter(|record| {
            record
                .address
                .as_ref()
                .is_some_and(|address| !address.address.trim().is_empty())
        })
        .collect();
    // undated bookings sort last; the sort is stable so API order breaks ties
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut saved: Vec<SavedAddress> = Vec::new();
    for record in records {
        let Some(address) = record.address.clone() else {
            continue;
        };
        let key = address_key(&address);
        if saved.iter().any(|existing| existing.key == key) {
            continue;
        }
        saved.push(SavedAddress {
            is_default: saved.is_empty(),
            key,
            address,
            contact_name: record.customer_name.clone(),
            contact_phone: record.customer_phone.clone(),
            last_used: record.created_at,
        });
    }
    saved
}

/// Fill the draft's address from a saved one. Customer name and phone are
/// only filled in when the draft does not have them yet.
pub fn apply_saved_address(draft: &mut BookingDraft, saved: &SavedAddress) {
    draft.address = saved.address.clone();
    if let Some(name) = &saved.contact_name {
        if draft.customer.name.trim().is_empty() {
            draft.customer.name = name.clone();
        }
    }
    if let Some(phone) = &saved.contact_phone {
        if draft.customer.phone.trim().is_empty() {
            draft.customer.phone = phone.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn address(street: &str, city: &str) -> AddressDetails {
        AddressDetails {
            house_details: "Unit 1".into(),
            address: street.into(),
            city: city.into(),
            state: "NSW".into(),
            pincode: "2000".into(),
        }
    }

    fn record(id: &str, day: u32, address: Option<AddressDetails>) -> BookingRecord {
        BookingRecord {
            id: id.into(),
            created_at: Some(Utc.with_ymd_and_hms(2025, 2, day, 9, 0, 0).unwrap()),
            customer_name: Some("Sam Taylor".into()),
            customer_phone: Some("0400111222".into()),
            address,
        }
    }

    #[test]
    fn duplicates_collapse_to_most_recent() {
        let history = vec![
            record("b1", 1, Some(address("12 George St", "Sydney"))),
            record("b2", 20, Some(address("12  george st", "SYDNEY"))),
            record("b3", 10, Some(address("5 King St", "Newtown"))),
            record("b4", 15, None),
        ];

        let saved = derive_saved_addresses(&history);

        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].address.address, "12  george st");
        assert!(saved[0].is_default);
        assert_eq!(saved[1].address.address, "5 King St");
        assert!(!saved[1].is_default);
    }

    #[test]
    fn empty_history_has_no_default() {
        assert!(derive_saved_addresses(&[]).is_empty());
    }

    #[test]
    fn applying_keeps_existing_contact_details() {
        let saved = derive_saved_addresses(&[record("b1", 3, Some(address("1 Pitt St", "Sydney")))]);
        let mut draft = BookingDraft::default();
        draft.customer.name = "Alex".into();

        apply_saved_address(&mut draft, &saved[0]);

        assert_eq!(draft.address.address, "1 Pitt St");
        assert_eq!(draft.customer.name, "Alex");
        assert_eq!(draft.customer.phone, "0400111222");
    }
}
