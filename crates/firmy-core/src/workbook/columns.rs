use super::layout::day_sheet_name;
use calamine::{Data, DataType};
use rust_xlsxwriter::ColNum;

/// Spreadsheet columns, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Score,
    Link,
    Name,
    Address,
    Phone,
    Category,
    Rejected,
    FirstSeen,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Score,
        Column::Link,
        Column::Name,
        Column::Address,
        Column::Phone,
        Column::Category,
        Column::Rejected,
        Column::FirstSeen,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::Score => "Liczba dopasowanych słów",
            Column::Link => "Link do firmy",
            Column::Name => "Nazwa firmy",
            Column::Address => "Adres",
            Column::Phone => "Numer telefonu",
            Column::Category => "Branża",
            Column::Rejected => "Odrzucona",
            Column::FirstSeen => "Data dodania",
        }
    }

    pub fn index(&self) -> ColNum {
        Self::ALL
            .iter()
            .position(|column| column == self)
            .unwrap_or_default() as ColNum
    }

    pub fn last() -> ColNum {
        (Self::ALL.len() - 1) as ColNum
    }

    fn from_header(text: &str) -> Option<Column> {
        let text = text.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|column| column.header().eq_ignore_ascii_case(text))
    }
}

/// Positions of the known columns inside a sheet's header row. Older files
/// left gaps between columns, so nothing is assumed about their order.
#[derive(Debug, Default)]
pub struct HeaderMap {
    positions: Vec<(Column, usize)>,
}

impl HeaderMap {
    pub fn from_row(row: &[Data]) -> Self {
        let positions = row
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| Column::from_header(&cell_text(cell)).map(|c| (c, i)))
            .collect();
        Self { positions }
    }

    pub fn has(&self, column: Column) -> bool {
        self.position(column).is_some()
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.positions
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, i)| *i)
    }

    /// Text of `column` in `row`, empty when the column is absent.
    pub fn text(&self, row: &[Data], column: Column) -> String {
        self.position(column)
            .and_then(|i| row.get(i))
            .map(cell_text)
            .unwrap_or_default()
    }
}

/// Renders a cell as text. Whole floats lose their fraction so phone numbers
/// a user retyped as numbers still produce the same key. Date cells come
/// out as `YYYY-MM-DD`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(day) => day_sheet_name(day),
            None => cell.to_string().trim().to_string(),
        },
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}
