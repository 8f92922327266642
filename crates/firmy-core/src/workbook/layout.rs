use crate::merge::SortOrder;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SINGLE_SHEET: &str = "Firmy";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// How records are spread over the sheets of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SheetLayout {
    /// One sheet, best keyword score first.
    #[default]
    Single,
    /// One sheet per ingestion day, named `YYYY-MM-DD`.
    Daily,
}

impl SheetLayout {
    pub fn sort_order(&self) -> SortOrder {
        match self {
            SheetLayout::Single => SortOrder::ByScore,
            SheetLayout::Daily => SortOrder::ByDay,
        }
    }

    pub fn sheet_name(&self, day: NaiveDate) -> String {
        match self {
            SheetLayout::Single => SINGLE_SHEET.to_string(),
            SheetLayout::Daily => day_sheet_name(day),
        }
    }
}

impl fmt::Display for SheetLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetLayout::Single => write!(f, "single"),
            SheetLayout::Daily => write!(f, "daily"),
        }
    }
}

pub fn day_sheet_name(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub fn parse_day(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DAY_FORMAT).ok()
}
