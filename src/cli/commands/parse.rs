use std::path::Path;

use crate::cli::utils::{load_workbook, output, output_json};
use crate::cli::OutputFormat;

/// Print the sheet summary, or the full extracted data with --json
pub async fn handle(path: &Path, media_type: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let data = load_workbook(path, media_type).await?;

    if output_format == OutputFormat::Json {
        return output_json(&data);
    }

    let mut lines = vec![format!(
        "{}: {} sheet(s), {} row(s), widest sheet {} column(s)",
        path.display(),
        data.summary.total_sheets,
        data.summary.total_rows,
        data.summary.total_columns
    )];
    lines.extend(
        data.sheets
            .iter()
            .map(|sheet| format!("  {:<24} {:>6} rows {:>4} cols", sheet.name, sheet.row_count, sheet.column_count)),
    );

    output(output_format, &data, &lines)
}
