use serde::{Deserialize, Serialize};

use super::parser::{CellValue, ExtractedData};

/// Dataset label used when the header has no second column
const DEFAULT_DATASET_LABEL: &str = "Data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub values: Vec<f64>,
}

/// Chart-ready view of the first sheet: column 0 as labels, column 1 as values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartProjection {
    pub labels: Vec<String>,
    pub dataset: Dataset,
}

/// Project the first sheet into chart data.
///
/// Returns None when there is no sheet or the first sheet has no data rows
/// beyond its header. Unparseable value cells become 0 without an error.
pub fn project(data: &ExtractedData) -> Option<ChartProjection> {
    let sheet = data.sheets.first()?;
    if sheet.rows.len() < 2 {
        return None;
    }

    let header = &sheet.rows[0];
    let data_rows = &sheet.rows[1..];

    let labels = data_rows
        .iter()
        .map(|row| row.first().map(CellValue::display).unwrap_or_default())
        .collect();

    let values = data_rows
        .iter()
        .map(|row| row.get(1).map(coerce_number).unwrap_or(0.0))
        .collect();

    let label = header
        .get(1)
        .filter(|cell| !cell.is_empty())
        .map(CellValue::display)
        .unwrap_or_else(|| DEFAULT_DATASET_LABEL.to_string());

    Some(ChartProjection {
        labels,
        dataset: Dataset { label, values },
    })
}

fn coerce_number(cell: &CellValue) -> f64 {
    let n = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => leading_number(s).unwrap_or(0.0),
        CellValue::Bool(_) | CellValue::Empty => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Longest decimal prefix of `s` (after leading whitespace) parsed as f64.
/// "12.5kg" -> 12.5, "-3e2x" -> -300, "abc" -> None.
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}
