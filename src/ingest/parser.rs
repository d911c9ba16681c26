use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Media types accepted for upload. Matched exactly after stripping parameters.
pub const XLSX_MEDIA_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MEDIA_TYPE: &str = "application/vnd.ms-excel";
pub const CSV_MEDIA_TYPE: &str = "text/csv";

pub const SUPPORTED_MEDIA_TYPES: [&str; 3] = [XLSX_MEDIA_TYPE, XLS_MEDIA_TYPE, CSV_MEDIA_TYPE];

/// Name given to the single sheet produced from CSV input
const CSV_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Decode(String),
}

/// Container formats the parser knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

impl SheetFormat {
    /// Resolve a declared media type, ignoring parameters such as `; charset=utf-8`
    pub fn from_media_type(media_type: &str) -> Result<Self, ParseError> {
        let normalized = media_type
            .split(';')
            .next()
            .map(str::trim)
            .unwrap_or(media_type)
            .to_ascii_lowercase();

        match normalized.as_str() {
            XLSX_MEDIA_TYPE | XLS_MEDIA_TYPE => Ok(SheetFormat::Workbook),
            CSV_MEDIA_TYPE => Ok(SheetFormat::Csv),
            _ => Err(ParseError::UnsupportedMediaType(media_type.to_string())),
        }
    }
}

/// Media type implied by a file extension, for clients that send no usable type
pub fn media_type_for_filename(name: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "xlsx" => Some(XLSX_MEDIA_TYPE),
        "xls" => Some(XLS_MEDIA_TYPE),
        "csv" => Some(CSV_MEDIA_TYPE),
        _ => None,
    }
}

/// A single cell. Serializes to a plain JSON string, number, bool or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Display form used for chart labels. Empty cells render as "".
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Empty => String::new(),
        }
    }

    /// Text cell with NUL characters removed; jsonb cannot store them
    fn text(s: &str) -> Self {
        if s.contains('\0') {
            CellValue::Text(s.replace('\0', ""))
        } else {
            CellValue::Text(s.to_string())
        }
    }

    fn from_csv_field(field: &str) -> Self {
        if field.is_empty() {
            return CellValue::Empty;
        }
        if field.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if field.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        match field.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::text(field),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::text(s),
            Data::Bool(b) => CellValue::Bool(*b),
            // Excel dates surface as their serial number
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s),
            Data::Error(e) => CellValue::Text(e.to_string()),
            Data::Empty => CellValue::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
    pub row_count: usize,
    pub column_count: usize,
}

impl SheetData {
    /// Returns None for a sheet without rows; such sheets are skipped entirely.
    fn from_rows(name: String, rows: Vec<Vec<CellValue>>) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let column_count = rows.first().map(Vec::len).unwrap_or(0);
        Some(Self {
            name,
            row_count: rows.len(),
            column_count,
            rows,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub total_sheets: usize,
    pub total_rows: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub sheets: Vec<SheetData>,
    pub summary: SheetSummary,
}

impl ExtractedData {
    /// `total_sheets` counts every sheet in the container, including skipped empty ones
    pub fn from_sheets(sheets: Vec<SheetData>, total_sheets: usize) -> Self {
        let summary = SheetSummary {
            total_sheets,
            total_rows: sheets.iter().map(|s| s.row_count).sum(),
            total_columns: sheets.iter().map(|s| s.column_count).max().unwrap_or(0),
        };
        Self { sheets, summary }
    }
}

/// Parse spreadsheet bytes of the given declared media type.
pub fn parse(bytes: &[u8], media_type: &str) -> Result<ExtractedData, ParseError> {
    let (sheets, total_sheets) = match SheetFormat::from_media_type(media_type)? {
        SheetFormat::Workbook => read_workbook(bytes)?,
        SheetFormat::Csv => (read_csv(bytes)?, 1),
    };
    Ok(ExtractedData::from_sheets(sheets, total_sheets))
}

fn read_workbook(bytes: &[u8]) -> Result<(Vec<SheetData>, usize), ParseError> {
    // Format is sniffed from the bytes; browsers often label .xlsx as vnd.ms-excel
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Decode(e.to_string()))?;

    let names = workbook.sheet_names();
    let total_sheets = names.len();
    let mut sheets = Vec::new();
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ParseError::Decode(e.to_string()))?;

        let rows = range
            .rows()
            .map(|row| trim_trailing_empty(row.iter().map(CellValue::from).collect()))
            .collect();

        if let Some(sheet) = SheetData::from_rows(name, rows) {
            sheets.push(sheet);
        }
    }
    Ok((sheets, total_sheets))
}

fn read_csv(bytes: &[u8]) -> Result<Vec<SheetData>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Decode(e.to_string()))?;
        rows.push(trim_trailing_empty(
            record.iter().map(CellValue::from_csv_field).collect(),
        ));
    }

    Ok(SheetData::from_rows(CSV_SHEET_NAME.to_string(), rows)
        .into_iter()
        .collect())
}

fn trim_trailing_empty(mut row: Vec<CellValue>) -> Vec<CellValue> {
    while row.last().is_some_and(CellValue::is_empty) {
        row.pop();
    }
    row
}
