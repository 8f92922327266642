mod collectors;
mod persistence;

use chrono::NaiveDate;
use firmy_core::{Annotation, Record};

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

pub fn record(phone: &str, name: &str, first_seen: NaiveDate) -> Record {
    Record {
        category: "hydraulik".to_string(),
        name: name.to_string(),
        address: "ul. Żeromskiego 1, Radom".to_string(),
        phone: phone.to_string(),
        website: Some(format!("https://{}.pl", name.to_lowercase())),
        matched_keyword_count: None,
        rejected: Annotation::Unset,
        first_seen,
        source: "test".to_string(),
    }
}
