use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Text written in place of a missing value.
pub const NO_DATA: &str = "Brak danych";

/// Placeholders the directory sites (and older versions of the output file)
/// use for a field that has no value.
const PLACEHOLDERS: [&str; 6] = ["brak danych", "brak", "brak nazwy", "brak adresu", "n/a", "-"];

/// Reduces a phone number to its digits. The result is the identity of a
/// business; an empty key means the number is unusable.
pub fn phone_key(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Strips the "w odległości: ..." distance suffix panoramafirm appends to
/// addresses and collapses runs of whitespace.
pub fn clean_address(address: &str) -> String {
    static DISTANCE_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let suffix = DISTANCE_SUFFIX
        .get_or_init(|| Regex::new(r"(?s)\s+w odległości:.*").expect("valid distance regex"));

    let stripped = suffix.replace(address.trim(), "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the trimmed text unless it is empty or one of the known
/// "no data" placeholders.
pub fn non_placeholder(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Manual "rejected" marker a human sets in the spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Annotation {
    #[default]
    Unset,
    Yes,
    No,
}

impl Annotation {
    pub const YES: &'static str = "TAK";
    pub const NO: &'static str = "NIE";

    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "tak" | "t" | "yes" | "y" => Annotation::Yes,
            "nie" | "n" | "no" => Annotation::No,
            _ => Annotation::Unset,
        }
    }

    pub fn as_cell(&self) -> &'static str {
        match self {
            Annotation::Unset => "",
            Annotation::Yes => Self::YES,
            Annotation::No => Self::NO,
        }
    }

    pub fn is_set(&self) -> bool {
        *self != Annotation::Unset
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cell())
    }
}

/// One business, keyed by its normalized phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub category: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub website: Option<String>,
    pub matched_keyword_count: Option<u32>,
    pub rejected: Annotation,
    pub first_seen: NaiveDate,
    pub source: String,
}

impl Record {
    pub fn key(&self) -> String {
        phone_key(&self.phone)
    }

    pub fn website_or_placeholder(&self) -> &str {
        self.website.as_deref().unwrap_or(NO_DATA)
    }

    /// Some directories list several sites joined with `" | "`; the first
    /// one is the link target.
    pub fn primary_website(&self) -> Option<&str> {
        self.website
            .as_deref()
            .and_then(|site| site.split(" | ").map(str::trim).find(|s| !s.is_empty()))
    }
}

/// A business as a collector saw it, before any filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub source: String,
    pub category: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl Candidate {
    pub fn new(source: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn has_phone(&self) -> bool {
        self.phone
            .as_deref()
            .map(|phone| !phone_key(phone).is_empty())
            .unwrap_or(false)
    }

    /// Converts into a record first seen on `day`. Returns `None` when the
    /// candidate has no usable phone number.
    pub fn into_record(self, day: NaiveDate) -> Option<Record> {
        if !self.has_phone() {
            return None;
        }

        Some(Record {
            category: self.category,
            name: self.name.unwrap_or_else(|| NO_DATA.to_string()),
            address: self.address.unwrap_or_else(|| NO_DATA.to_string()),
            phone: self.phone.unwrap_or_default(),
            website: self.website,
            matched_keyword_count: None,
            rejected: Annotation::Unset,
            first_seen: day,
            source: self.source,
        })
    }
}

/// Which missing fields disqualify a candidate. A candidate without a phone
/// number is rejected under every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CandidatePolicy {
    PhoneOnly,
    PhoneAndWebsite,
}

impl CandidatePolicy {
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        if !candidate.has_phone() {
            return false;
        }

        match self {
            CandidatePolicy::PhoneOnly => true,
            CandidatePolicy::PhoneAndWebsite => candidate.website.is_some(),
        }
    }

    pub fn apply(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let total = candidates.len();
        let accepted: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| self.accepts(candidate))
            .collect();

        tracing::debug!(
            "Policy {:?} kept {} of {} candidates",
            self,
            accepted.len(),
            total
        );
        accepted
    }
}

impl fmt::Display for CandidatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidatePolicy::PhoneOnly => write!(f, "phone-only"),
            CandidatePolicy::PhoneAndWebsite => write!(f, "phone-and-website"),
        }
    }
}
