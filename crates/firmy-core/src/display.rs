use crate::record::{Annotation, Record};
use colored::Colorize;
use tabled::settings::{object::Columns, Modify, Style, Width};
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct RecordTableRow {
    #[tabled(rename = "Score", display_with = "display_right_5")]
    pub score: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Phone")]
    pub phone: String,
    #[tabled(rename = "Website")]
    pub website: String,
    #[tabled(rename = "Address")]
    pub address: String,
    #[tabled(rename = "Rejected")]
    pub rejected: String,
    #[tabled(rename = "Added")]
    pub added: String,
}

fn display_right_5(s: &str) -> String {
    format!("{:>5}", s)
}

impl RecordTableRow {
    pub fn from_record(record: &Record) -> Self {
        let rejected = match record.rejected {
            Annotation::Yes => record.rejected.as_cell().red().bold().to_string(),
            Annotation::No => record.rejected.as_cell().green().to_string(),
            Annotation::Unset => String::new(),
        };

        Self {
            score: record
                .matched_keyword_count
                .map(|score| score.to_string())
                .unwrap_or_else(|| "-".to_string()),
            name: record.name.clone(),
            phone: record.phone.clone(),
            website: record.website_or_placeholder().to_string(),
            address: record.address.clone(),
            rejected,
            added: record.first_seen.to_string(),
        }
    }
}

pub fn create_record_table(records: &[&Record]) -> String {
    let rows: Vec<RecordTableRow> = records
        .iter()
        .map(|record| RecordTableRow::from_record(record))
        .collect();

    let mut table = Table::new(&rows);
    table
        .with(Style::modern())
        .with(Modify::new(Columns::single(1)).with(Width::truncate(40)))   // Name
        .with(Modify::new(Columns::single(3)).with(Width::truncate(40)))   // Website
        .with(Modify::new(Columns::single(4)).with(Width::wrap(50)));      // Address

    table.to_string()
}
