pub mod config;
mod display;
mod error;
pub mod merge;
pub mod record;
pub mod workbook;

pub use config::{Config, KeywordLists};
pub use display::{create_record_table, RecordTableRow};
pub use error::{FirmyError, Result};
pub use merge::{dedup, merge, CollectionSummary, MergeOutcome, SortOrder, Store};
pub use record::{
    clean_address, non_placeholder, phone_key, Annotation, Candidate, CandidatePolicy, Record,
    NO_DATA,
};
pub use workbook::{SheetLayout, Spreadsheet};
