use crate::{day, record};
use calamine::{open_workbook, Data, Reader, Xlsx};
use firmy_core::workbook::Column;
use firmy_core::{Annotation, SheetLayout, Spreadsheet};
use rust_xlsxwriter::Workbook;
use std::path::Path;
use tempfile::tempdir;

fn sheet_names(path: &Path) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook(path).unwrap();
    workbook.sheet_names()
}

fn header_row(path: &Path, sheet: &str) -> Vec<String> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .next()
        .unwrap()
        .iter()
        .map(|cell| match cell {
            Data::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect()
}

#[test]
fn test_manual_rejection_survives_rerun() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("firmy.xlsx");

    // the file as someone left it after marking a company
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Firmy").unwrap();
    for column in Column::ALL {
        sheet.write_string(0, column.index(), column.header()).unwrap();
    }
    sheet.write_number(1, Column::Score.index(), 3.0).unwrap();
    sheet.write_string(1, Column::Link.index(), "https://aqua.pl").unwrap();
    sheet.write_string(1, Column::Name.index(), "Aqua-Serwis").unwrap();
    sheet.write_string(1, Column::Address.index(), "ul. Długa 5, Radom").unwrap();
    sheet.write_string(1, Column::Phone.index(), "+48 123-456-789").unwrap();
    sheet.write_string(1, Column::Category.index(), "hydraulik").unwrap();
    sheet.write_string(1, Column::Rejected.index(), "TAK").unwrap();
    sheet.write_string(1, Column::FirstSeen.index(), "2024-05-01").unwrap();
    workbook.save(&path).unwrap();

    let spreadsheet = Spreadsheet::new(&path, SheetLayout::Single);
    let outcome = spreadsheet
        .persist(vec![
            record("48 123 456 789", "Aqua-Nowa", day(7)),
            record("600 100 200", "Hydro", day(7)),
        ])
        .unwrap();
    assert_eq!(outcome.added, 1);

    let records = spreadsheet.load().unwrap();
    assert_eq!(records.len(), 2);

    let aqua = records.iter().find(|r| r.key() == "48123456789").unwrap();
    assert_eq!(aqua.rejected, Annotation::Yes);
    assert_eq!(aqua.name, "Aqua-Serwis");
    assert_eq!(aqua.matched_keyword_count, Some(3));
    assert_eq!(aqua.first_seen, day(1));
}

#[test]
fn test_older_five_column_file_is_upgraded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("firmy.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Arkusz1").unwrap();
    let legacy = [
        Column::Score,
        Column::Link,
        Column::Name,
        Column::Address,
        Column::Phone,
    ];
    for (col, column) in legacy.iter().enumerate() {
        sheet.write_string(0, col as u16, column.header()).unwrap();
    }
    sheet.write_string(1, 1, "link").unwrap();
    sheet.write_string(1, 2, "Stara Firma").unwrap();
    sheet.write_string(1, 3, "Rynek 2, Kielce").unwrap();
    sheet.write_string(1, 4, "500 600 700").unwrap();
    sheet.write_number(2, 0, 2.0).unwrap();
    sheet.write_string(2, 1, "https://nowa.pl").unwrap();
    sheet.write_string(2, 2, "Nowa").unwrap();
    sheet.write_string(2, 4, "500-600-701").unwrap();
    sheet.write_string(3, 2, "Bez telefonu").unwrap();
    workbook.save(&path).unwrap();

    let spreadsheet = Spreadsheet::new(&path, SheetLayout::Single);
    let loaded = spreadsheet.load().unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].website, None);
    assert_eq!(loaded[1].matched_keyword_count, Some(2));
    assert_eq!(loaded[1].website.as_deref(), Some("https://nowa.pl"));
    assert!(loaded[2].phone.is_empty());

    let outcome = spreadsheet
        .persist(vec![record("500600700", "Duplikat", day(3))])
        .unwrap();
    assert_eq!(outcome.added, 0);
    // the row without a phone is carried over as it was
    assert_eq!(outcome.store.len(), 3);

    assert_eq!(sheet_names(&path), vec!["Firmy".to_string()]);
    let headers = header_row(&path, "Firmy");
    let expected: Vec<String> = Column::ALL.iter().map(|c| c.header().to_string()).collect();
    assert_eq!(headers, expected);

    // the earlier name is kept, the missing website is filled in
    let stored = spreadsheet.load().unwrap();
    let first = stored.iter().find(|r| r.key() == "500600700").unwrap();
    assert_eq!(first.name, "Stara Firma");
    assert_eq!(first.website.as_deref(), Some("https://duplikat.pl"));
}

#[test]
fn test_daily_layout_keeps_days_apart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dzienne.xlsx");
    let spreadsheet = Spreadsheet::new(&path, SheetLayout::Daily);

    spreadsheet
        .persist(vec![record("111 111 111", "Pierwsza", day(1))])
        .unwrap();
    let outcome = spreadsheet
        .persist(vec![
            record("222 222 222", "Druga", day(2)),
            record("111-111-111", "Pierwsza-Znowu", day(2)),
        ])
        .unwrap();
    assert_eq!(outcome.added, 1);

    let names = sheet_names(&path);
    assert!(names.contains(&"2024-05-01".to_string()));
    assert!(names.contains(&"2024-05-02".to_string()));
    assert_eq!(names.len(), 2);

    let records = spreadsheet.load().unwrap();
    let first = records.iter().find(|r| r.key() == "111111111").unwrap();
    assert_eq!(first.first_seen, day(1));
    assert_eq!(first.name, "Pierwsza");
}

#[test]
fn test_repeated_persist_keeps_row_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("firmy.xlsx");
    let spreadsheet = Spreadsheet::new(&path, SheetLayout::Single);
    let batch = vec![
        record("123-456-789", "Aqua", day(1)),
        record("123456789", "Aqua-Dup", day(1)),
        record("987 654 321", "Hydro", day(1)),
    ];

    let first = spreadsheet.persist(batch.clone()).unwrap();
    let second = spreadsheet.persist(batch).unwrap();

    assert_eq!(first.added, 2);
    assert_eq!(second.added, 0);
    assert_eq!(spreadsheet.load().unwrap().len(), 2);
}
