pub mod columns;
pub mod layout;

pub use columns::{Column, HeaderMap};
pub use layout::{SheetLayout, SINGLE_SHEET};

use crate::merge::{merge, MergeOutcome, Store};
use crate::record::{non_placeholder, phone_key, Annotation, Record};
use crate::Result;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{Local, NaiveDate};
use layout::{day_sheet_name, parse_day};
use rust_xlsxwriter::{
    utility::column_number_to_name, Color, ConditionalFormatFormula, DataValidation, Format,
    Workbook, Worksheet,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Source recorded on rows read back from the spreadsheet.
pub const LOADED_SOURCE: &str = "workbook";

/// Excel refuses hyperlinks longer than this.
const MAX_LINK_LEN: usize = 2079;

/// Text older files put in the link column; the target itself is not readable.
const LEGACY_LINK_TEXT: &str = "link";

/// The `.xlsx` file records are merged into. Every save rewrites the whole
/// file: headers, hyperlinks, the annotation choice list and the highlight
/// rule for rejected rows.
#[derive(Debug, Clone)]
pub struct Spreadsheet {
    path: PathBuf,
    layout: SheetLayout,
}

impl Spreadsheet {
    pub fn new(path: impl Into<PathBuf>, layout: SheetLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> SheetLayout {
        self.layout
    }

    /// Reads every sheet of the file. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<Record>> {
        if !self.path.exists() {
            debug!("{} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let today = Local::now().date_naive();
        let mut records = Vec::new();

        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            let rows = read_sheet(&name, &range, today);
            debug!("Read {} rows from sheet '{}'", rows.len(), name);
            records.extend(rows);
        }

        Ok(records)
    }

    /// Like [`Spreadsheet::load`], but an unreadable file is moved aside and
    /// the run continues from an empty store.
    pub fn load_or_recover(&self) -> Result<Vec<Record>> {
        match self.load() {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    "Could not read {}: {}. Starting from an empty store",
                    self.path.display(),
                    e
                );
                self.quarantine()?;
                Ok(Vec::new())
            }
        }
    }

    fn quarantine(&self) -> Result<PathBuf> {
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("firmy");
        let stamp = Local::now().format("%Y%m%d%H%M%S");
        let target = self
            .path
            .with_file_name(format!("{}.corrupt-{}.xlsx", stem, stamp));

        fs::rename(&self.path, &target)?;
        warn!("Moved unreadable file to {}", target.display());
        Ok(target)
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        let mut sheets: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
        for record in store.sorted(self.layout.sort_order()) {
            sheets
                .entry(self.layout.sheet_name(record.first_seen))
                .or_default()
                .push(record);
        }
        if sheets.is_empty() {
            let today = Local::now().date_naive();
            sheets.insert(self.layout.sheet_name(today), Vec::new());
        }

        let formats = Formats::new();
        let mut workbook = Workbook::new();
        for (name, records) in &sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(name)?;
            write_sheet(worksheet, records, &formats)?;
        }

        // Write next to the target and rename, so a failed save never
        // truncates the previous file.
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let temp = NamedTempFile::new_in(parent)?;
        workbook.save(temp.path())?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        info!(
            "Wrote {} records in {} sheet(s) to {}",
            store.len(),
            sheets.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Loads the file, merges `incoming` into it and writes it back.
    pub fn persist(&self, incoming: Vec<Record>) -> Result<MergeOutcome> {
        let existing = self.load_or_recover()?;
        let outcome = merge(existing, incoming);
        self.save(&outcome.store)?;
        Ok(outcome)
    }
}

struct Formats {
    header: Format,
    rejected: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            rejected: Format::new()
                .set_background_color(Color::RGB(0xFFC7CE))
                .set_font_color(Color::RGB(0x9C0006)),
        }
    }
}

fn write_sheet(worksheet: &mut Worksheet, records: &[&Record], formats: &Formats) -> Result<()> {
    let mut widths: Vec<usize> = Column::ALL
        .iter()
        .map(|column| column.header().chars().count())
        .collect();

    for column in Column::ALL {
        worksheet.write_string_with_format(0, column.index(), column.header(), &formats.header)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;

        if let Some(score) = record.matched_keyword_count {
            worksheet.write_number(row, Column::Score.index(), score as f64)?;
        }
        write_link(worksheet, row, record)?;
        worksheet.write_string(row, Column::Name.index(), &record.name)?;
        worksheet.write_string(row, Column::Address.index(), &record.address)?;
        worksheet.write_string(row, Column::Phone.index(), &record.phone)?;
        worksheet.write_string(row, Column::Category.index(), &record.category)?;
        if record.rejected.is_set() {
            worksheet.write_string(row, Column::Rejected.index(), record.rejected.as_cell())?;
        }
        worksheet.write_string(
            row,
            Column::FirstSeen.index(),
            day_sheet_name(record.first_seen),
        )?;

        for column in Column::ALL {
            let width = &mut widths[column.index() as usize];
            *width = (*width).max(display_text(record, column).chars().count());
        }
    }

    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width + 2) as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    if !records.is_empty() {
        let last_row = records.len() as u32;
        let rejected_col = Column::Rejected.index();

        let choices = DataValidation::new().allow_list_strings(&[Annotation::YES, Annotation::NO])?;
        worksheet.add_data_validation(1, rejected_col, last_row, rejected_col, &choices)?;

        let rule = format!(
            "=${}2=\"{}\"",
            column_number_to_name(rejected_col),
            Annotation::YES
        );
        let highlight = ConditionalFormatFormula::new()
            .set_rule(rule.as_str())
            .set_format(&formats.rejected);
        worksheet.add_conditional_format(1, 0, last_row, Column::last(), &highlight)?;
    }

    Ok(())
}

fn write_link(worksheet: &mut Worksheet, row: u32, record: &Record) -> Result<()> {
    let col = Column::Link.index();
    let text = record.website_or_placeholder();

    match record.primary_website().filter(|url| is_linkable(url)) {
        Some(url) => worksheet.write_url_with_text(row, col, url, text)?,
        None => worksheet.write_string(row, col, text)?,
    };
    Ok(())
}

fn is_linkable(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && url.len() <= MAX_LINK_LEN
}

fn display_text(record: &Record, column: Column) -> String {
    match column {
        Column::Score => record
            .matched_keyword_count
            .map(|score| score.to_string())
            .unwrap_or_default(),
        Column::Link => record.website_or_placeholder().to_string(),
        Column::Name => record.name.clone(),
        Column::Address => record.address.clone(),
        Column::Phone => record.phone.clone(),
        Column::Category => record.category.clone(),
        Column::Rejected => record.rejected.as_cell().to_string(),
        Column::FirstSeen => day_sheet_name(record.first_seen),
    }
}

fn read_sheet(name: &str, range: &Range<Data>, today: NaiveDate) -> Vec<Record> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };

    let headers = HeaderMap::from_row(header_row);
    if !headers.has(Column::Phone) {
        warn!("Sheet '{}' has no phone column, skipping it", name);
        return Vec::new();
    }

    let sheet_day = parse_day(name).unwrap_or(today);

    rows.filter_map(|row| {
        if row.iter().all(|cell| columns::cell_text(cell).is_empty()) {
            return None;
        }
        let phone = headers.text(row, Column::Phone);
        if phone_key(&phone).is_empty() {
            debug!("Keeping a row without a phone in sheet '{}'", name);
        }

        let website = non_placeholder(&headers.text(row, Column::Link))
            .filter(|site| !site.eq_ignore_ascii_case(LEGACY_LINK_TEXT));

        Some(Record {
            category: headers.text(row, Column::Category),
            name: headers.text(row, Column::Name),
            address: headers.text(row, Column::Address),
            phone,
            website,
            matched_keyword_count: headers.text(row, Column::Score).parse().ok(),
            rejected: Annotation::parse(&headers.text(row, Column::Rejected)),
            first_seen: parse_day(&headers.text(row, Column::FirstSeen)).unwrap_or(sheet_day),
            source: LOADED_SOURCE.to_string(),
        })
    })
    .collect()
}
