use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{CellValue, DecodedSheet, SchemaPolicy};
use crate::error::AppError;

/// csv has no sheet concept; decoded csv files get this synthetic name.
const CSV_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Xlsx,
    Csv,
}

impl FormatHint {
    pub fn from_file_name(name: &str) -> Option<FormatHint> {
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("xlsx") {
            Some(FormatHint::Xlsx)
        } else if ext.eq_ignore_ascii_case("csv") {
            Some(FormatHint::Csv)
        } else {
            None
        }
    }
}

/// Decodes raw spreadsheet bytes into the first sheet's rows. Pure
/// transformation over the byte content; the whole file is held in memory.
pub fn decode(
    bytes: &Bytes,
    hint: FormatHint,
    schema: SchemaPolicy,
) -> Result<DecodedSheet, AppError> {
    match hint {
        FormatHint::Xlsx => decode_xlsx(bytes, schema),
        FormatHint::Csv => decode_csv(bytes, schema),
    }
}

fn decode_xlsx(bytes: &Bytes, schema: SchemaPolicy) -> Result<DecodedSheet, AppError> {
    let cursor = Cursor::new(bytes.as_ref());
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor)
        .map_err(|e| AppError::Decode(format!("failed to open workbook: {e}")))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| AppError::Decode("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Decode(format!("failed to read worksheet {sheet_name}: {e}")))?;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(row) => row.iter().map(convert_cell).collect::<Vec<_>>(),
        None => return Err(AppError::EmptySheet),
    };
    let data: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    assemble_sheet(sheet_names, sheet_name, header, data, schema)
}

fn decode_csv(bytes: &Bytes, schema: SchemaPolicy) -> Result<DecodedSheet, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_ref());

    let mut records = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::Decode(format!("failed to parse csv: {e}")))?;
        records.push(record);
    }

    let mut records = records.into_iter();
    let header = match records.next() {
        Some(record) => record.iter().map(convert_field).collect::<Vec<_>>(),
        None => return Err(AppError::Decode("file is empty".to_string())),
    };
    let data: Vec<Vec<CellValue>> = records
        .map(|record| record.iter().map(convert_field).collect())
        .collect();

    assemble_sheet(
        vec![CSV_SHEET_NAME.to_string()],
        CSV_SHEET_NAME.to_string(),
        header,
        data,
        schema,
    )
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => CellValue::Date(d),
            None => CellValue::Null,
        },
        Data::DateTimeIso(s) => match parse_date_string(s) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // Formula error cells carry no usable value.
        Data::Error(_) => CellValue::Null,
    }
}

fn convert_field(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Null;
    }
    if let Ok(n) = field.parse::<f64>() {
        if n.is_finite() {
            return CellValue::Number(n);
        }
        return CellValue::Text(field.to_string());
    }
    if field.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if field.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    if let Some(d) = parse_date_string(field) {
        return CellValue::Date(d);
    }
    CellValue::Text(field.to_string())
}

fn assemble_sheet(
    sheet_names: Vec<String>,
    sheet_name: String,
    header: Vec<CellValue>,
    data: Vec<Vec<CellValue>>,
    schema: SchemaPolicy,
) -> Result<DecodedSheet, AppError> {
    // Blank rows carry no record, mirroring how sheet readers skip them.
    let mut rows: Vec<Vec<CellValue>> = data
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(AppError::EmptySheet);
    }

    let width = match schema {
        SchemaPolicy::FirstRow => header.len(),
        SchemaPolicy::Union => rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0),
    };
    if width == 0 {
        return Err(AppError::EmptySheet);
    }

    let raw_names: Vec<String> = (0..width)
        .map(|idx| match header.get(idx) {
            Some(cell) if !cell.is_empty() => cell.to_string(),
            _ => format!("column_{}", idx + 1),
        })
        .collect();
    let columns = unique_column_names(raw_names);

    for row in &mut rows {
        row.truncate(width);
        row.resize(width, CellValue::Null);
    }

    Ok(DecodedSheet {
        sheet_names,
        sheet_name,
        columns,
        rows,
    })
}

fn unique_column_names(raw: Vec<String>) -> Vec<String> {
    let mut existing = HashSet::new();
    raw.into_iter()
        .map(|name| {
            let mut cleaned = name.clone();
            // If the name already exists, add a numeric suffix
            let mut counter = 1;
            while !existing.insert(cleaned.clone()) {
                counter += 1;
                cleaned = format!("{name}_{counter}");
            }
            cleaned
        })
        .collect()
}

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{4}-\d{2}-\d{2}$",
        r"^\d{2}/\d{2}/\d{4}$",
        r"^\d{4}/\d{2}/\d{2}$",
        r"^\d{2}-\d{2}-\d{4}$",
        r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}$",
        r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("date pattern compiles"))
    .collect()
});

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

pub(crate) fn parse_date_string(s: &str) -> Option<NaiveDateTime> {
    if !DATE_PATTERNS.iter().any(|re| re.is_match(s)) {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InferredType;

    fn csv_bytes(content: &str) -> Bytes {
        Bytes::from(content.to_string())
    }

    fn xlsx_bytes(build: impl FnOnce(&mut rust_xlsxwriter::Worksheet)) -> Bytes {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();
        build(worksheet);
        Bytes::from(workbook.save_to_buffer().unwrap())
    }

    #[test]
    fn decodes_csv_with_typed_cells() {
        let bytes = csv_bytes("Country,Sales,Active\nUS,10,true\nUK,5.5,false\n");
        let sheet = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();

        assert_eq!(sheet.sheet_name, "Sheet1");
        assert_eq!(sheet.columns, vec!["Country", "Sales", "Active"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], CellValue::Text("US".to_string()));
        assert_eq!(sheet.rows[0][1], CellValue::Number(10.0));
        assert_eq!(sheet.rows[0][2], CellValue::Bool(true));
        assert_eq!(sheet.rows[1][1], CellValue::Number(5.5));
    }

    #[test]
    fn csv_date_strings_become_dates() {
        let bytes = csv_bytes("When\n2023-01-15\n");
        let sheet = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();
        assert_eq!(sheet.rows[0][0].type_of(), InferredType::Date);
    }

    #[test]
    fn zero_byte_input_is_a_decode_error() {
        let empty = Bytes::new();
        assert!(matches!(
            decode(&empty, FormatHint::Csv, SchemaPolicy::FirstRow),
            Err(AppError::Decode(_))
        ));
        assert!(matches!(
            decode(&empty, FormatHint::Xlsx, SchemaPolicy::FirstRow),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let bytes = Bytes::from_static(b"not a workbook at all");
        assert!(matches!(
            decode(&bytes, FormatHint::Xlsx, SchemaPolicy::FirstRow),
            Err(AppError::Decode(_))
        ));
    }

    #[test]
    fn header_only_sheet_is_empty_not_corrupt() {
        let bytes = csv_bytes("Country,Sales\n");
        assert!(matches!(
            decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow),
            Err(AppError::EmptySheet)
        ));
    }

    #[test]
    fn blank_rows_are_dropped() {
        let bytes = csv_bytes("A,B\n1,2\n,\n3,4\n");
        let sheet = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();
        assert_eq!(sheet.rows.len(), 2);
    }

    #[test]
    fn all_blank_data_rows_are_an_empty_sheet() {
        let bytes = csv_bytes("A,B\n,\n,\n");
        assert!(matches!(
            decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow),
            Err(AppError::EmptySheet)
        ));
    }

    #[test]
    fn duplicate_and_blank_headers_get_stable_names() {
        let bytes = csv_bytes("Sales,Sales,\n1,2,3\n");
        let sheet = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();
        assert_eq!(sheet.columns, vec!["Sales", "Sales_2", "column_3"]);
    }

    #[test]
    fn first_row_schema_truncates_wider_rows() {
        let bytes = csv_bytes("A,B\n1,2,3\n");
        let sheet = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();
        assert_eq!(sheet.columns.len(), 2);
        assert_eq!(sheet.rows[0].len(), 2);
    }

    #[test]
    fn union_schema_widens_to_the_longest_row() {
        let bytes = csv_bytes("A,B\n1,2,3\n4\n");
        let sheet = decode(&bytes, FormatHint::Csv, SchemaPolicy::Union).unwrap();
        assert_eq!(sheet.columns, vec!["A", "B", "column_3"]);
        assert_eq!(sheet.rows[0][2], CellValue::Number(3.0));
        // Shorter rows are padded out with nulls.
        assert_eq!(sheet.rows[1][1], CellValue::Null);
        assert_eq!(sheet.rows[1][2], CellValue::Null);
    }

    #[test]
    fn decodes_xlsx_first_sheet() {
        let bytes = xlsx_bytes(|ws| {
            ws.write_string(0, 0, "Country").unwrap();
            ws.write_string(0, 1, "Sales").unwrap();
            ws.write_string(1, 0, "US").unwrap();
            ws.write_number(1, 1, 10.0).unwrap();
            ws.write_string(2, 0, "UK").unwrap();
            ws.write_number(2, 1, 5.0).unwrap();
        });
        let sheet = decode(&bytes, FormatHint::Xlsx, SchemaPolicy::FirstRow).unwrap();

        assert_eq!(sheet.sheet_names.len(), 1);
        assert_eq!(sheet.columns, vec!["Country", "Sales"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][1], CellValue::Number(10.0));
    }

    #[test]
    fn header_only_xlsx_is_an_empty_sheet() {
        let bytes = xlsx_bytes(|ws| {
            ws.write_string(0, 0, "Country").unwrap();
        });
        assert!(matches!(
            decode(&bytes, FormatHint::Xlsx, SchemaPolicy::FirstRow),
            Err(AppError::EmptySheet)
        ));
    }

    #[test]
    fn format_hint_comes_from_the_extension() {
        assert_eq!(
            FormatHint::from_file_name("report.XLSX"),
            Some(FormatHint::Xlsx)
        );
        assert_eq!(
            FormatHint::from_file_name("data.csv"),
            Some(FormatHint::Csv)
        );
        assert_eq!(FormatHint::from_file_name("notes.txt"), None);
        assert_eq!(FormatHint::from_file_name("noextension"), None);
    }

    #[test]
    fn date_string_parsing_accepts_common_formats() {
        assert!(parse_date_string("2023-01-15").is_some());
        assert!(parse_date_string("15/01/2023").is_some());
        assert!(parse_date_string("2023-01-15 10:30:00").is_some());
        assert!(parse_date_string("2023-01-15T10:30:00").is_some());
        assert!(parse_date_string("not a date").is_none());
        assert!(parse_date_string("99/99/2023").is_none());
    }

    #[test]
    fn decoding_is_deterministic() {
        let bytes = csv_bytes("Country,Sales\nUS,10\nUK,5\n");
        let a = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();
        let b = decode(&bytes, FormatHint::Csv, SchemaPolicy::FirstRow).unwrap();
        assert_eq!(a, b);
    }
}
