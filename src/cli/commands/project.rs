use std::path::Path;

use crate::cli::utils::{load_workbook, output};
use crate::cli::OutputFormat;
use crate::ingest::projector;

pub async fn handle(path: &Path, media_type: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let data = load_workbook(path, media_type).await?;
    let projection = projector::project(&data);

    let lines = match &projection {
        None => vec!["No chart data: the first sheet needs a header row and at least one data row".to_string()],
        Some(chart) => {
            let mut lines = vec![format!("Dataset: {}", chart.dataset.label)];
            lines.extend(
                chart
                    .labels
                    .iter()
                    .zip(&chart.dataset.values)
                    .map(|(label, value)| format!("  {:<24} {}", label, value)),
            );
            lines
        }
    };

    output(output_format, &projection, &lines)
}
