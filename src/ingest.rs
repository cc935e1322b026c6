//! Parsing uploaded files into row documents
//!
//! CSV and TSV go through the `csv` crate, JSON must be an array of flat
//! objects, and spreadsheets are read with `calamine` (first non-empty
//! sheet, first row is the header).

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{
    open_workbook_from_rs, Data, Ods, OdsError, Range, Reader, Xls, XlsError, Xlsx, XlsxError,
};
use serde_json::Value;
use tracing::debug;

use crate::database::entities::common_types::FileFormat;
use crate::errors::{DatasetError, DatasetResult};
use crate::records::{FieldValue, RowDocument};

/// Rows parsed from one file, with the header in file order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub rows: Vec<RowDocument>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Resolve the format from `file_name` and parse `bytes`
pub fn parse_file(file_name: &str, bytes: &[u8]) -> DatasetResult<ParsedTable> {
    let format = FileFormat::from_extension(file_name)
        .ok_or_else(|| DatasetError::UnsupportedFormat(file_name.to_string()))?;
    let table = parse_bytes(format, bytes)?;
    debug!(
        "Parsed {} as {}: {} rows, {} columns",
        file_name,
        format,
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

pub fn parse_bytes(format: FileFormat, bytes: &[u8]) -> DatasetResult<ParsedTable> {
    match format {
        FileFormat::Csv => parse_delimited(bytes, b','),
        FileFormat::Tsv => parse_delimited(bytes, b'\t'),
        FileFormat::Json => parse_json(bytes),
        FileFormat::Xlsx => {
            let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e: XlsxError| DatasetError::InvalidSpreadsheet(e.to_string()))?;
            parse_workbook(workbook)
        }
        FileFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e: XlsError| DatasetError::InvalidSpreadsheet(e.to_string()))?;
            parse_workbook(workbook)
        }
        FileFormat::Ods => {
            let workbook: Ods<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e: OdsError| DatasetError::InvalidSpreadsheet(e.to_string()))?;
            parse_workbook(workbook)
        }
    }
}

fn parse_delimited(bytes: &[u8], delimiter: u8) -> DatasetResult<ParsedTable> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(DatasetError::EmptySource("file is empty".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let columns = validate_header(reader.headers()?.iter().map(str::to_string).collect())?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            DatasetError::InvalidCsv(format!("record {}: {}", line + 1, e))
        })?;
        let row: RowDocument = columns
            .iter()
            .zip(record.iter())
            .map(|(column, cell)| (column.clone(), FieldValue::from_cell(cell)))
            .collect();
        if !is_blank(&row) {
            rows.push(row);
        }
    }

    Ok(ParsedTable { columns, rows })
}

fn parse_json(bytes: &[u8]) -> DatasetResult<ParsedTable> {
    let value: Value = serde_json::from_slice(bytes)?;
    let items = value
        .as_array()
        .ok_or_else(|| DatasetError::InvalidJson("expected an array of objects".to_string()))?;
    if items.is_empty() {
        return Err(DatasetError::EmptySource("JSON array is empty".to_string()));
    }

    let mut columns: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        rows.push(json_row(index, item)?);
        if let Some(object) = item.as_object() {
            for key in object.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let columns = validate_header(columns)?;
    rows.retain(|row| !is_blank(row));
    Ok(ParsedTable { columns, rows })
}

/// Convert one JSON object into a row; nested values are rejected
pub fn json_row(index: usize, item: &Value) -> DatasetResult<RowDocument> {
    let object = item.as_object().ok_or_else(|| {
        DatasetError::InvalidJson(format!("row {} is not an object", index))
    })?;

    let mut row = RowDocument::with_capacity(object.len());
    for (key, value) in object {
        let field = match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| {
                    DatasetError::InvalidJson(format!("row {} field '{}' is out of range", index, key))
                })?,
            Value::String(s) => FieldValue::from_cell(s),
            Value::Array(_) | Value::Object(_) => {
                return Err(DatasetError::InvalidJson(format!(
                    "row {} field '{}' is not a scalar",
                    index, key
                )))
            }
        };
        row.insert(key.clone(), field);
    }
    Ok(row)
}

fn parse_workbook<R>(mut workbook: R) -> DatasetResult<ParsedTable>
where
    R: Reader<Cursor<Vec<u8>>>,
    R::Error: std::fmt::Display,
{
    let mut sheet = None;
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| DatasetError::InvalidSpreadsheet(format!("sheet '{}': {}", name, e)))?;
        if !range.is_empty() {
            debug!("Reading sheet '{}'", name);
            sheet = Some(range);
            break;
        }
    }

    let range =
        sheet.ok_or_else(|| DatasetError::EmptySource("workbook has no data".to_string()))?;
    parse_range(&range)
}

fn parse_range(range: &Range<Data>) -> DatasetResult<ParsedTable> {
    let mut sheet_rows = range.rows();
    let header = sheet_rows
        .next()
        .ok_or_else(|| DatasetError::EmptySource("sheet has no header row".to_string()))?;
    let columns = validate_header(header.iter().map(|cell| cell_value(cell).to_text()).collect())?;

    let mut rows = Vec::new();
    for cells in sheet_rows {
        let row: RowDocument = columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let value = cells.get(index).map(cell_value).unwrap_or(FieldValue::Null);
                (column.clone(), value)
            })
            .collect();
        if !is_blank(&row) {
            rows.push(row);
        }
    }

    Ok(ParsedTable { columns, rows })
}

fn cell_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Int(i) => FieldValue::Number(*i as f64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::String(s) => FieldValue::from_cell(s),
        Data::Bool(b) => FieldValue::Boolean(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) if datetime.time() == chrono::NaiveTime::MIN => {
                FieldValue::Date(datetime.date())
            }
            Some(datetime) => FieldValue::Text(datetime.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => FieldValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => FieldValue::from_cell(s),
        Data::Error(_) | Data::Empty => FieldValue::Null,
    }
}

fn validate_header(columns: Vec<String>) -> DatasetResult<Vec<String>> {
    if columns.is_empty() {
        return Err(DatasetError::EmptySource("no header row".to_string()));
    }

    let columns: Vec<String> = columns.into_iter().map(|c| c.trim().to_string()).collect();
    let mut seen = HashSet::new();
    for (index, column) in columns.iter().enumerate() {
        if column.is_empty() {
            return Err(DatasetError::InvalidHeader(format!(
                "column {} has an empty name",
                index + 1
            )));
        }
        if !seen.insert(column.as_str()) {
            return Err(DatasetError::InvalidHeader(format!(
                "duplicate column '{}'",
                column
            )));
        }
    }

    Ok(columns)
}

fn is_blank(row: &RowDocument) -> bool {
    row.values().all(FieldValue::is_missing)
}
