use std::path::Path;

use anyhow::{anyhow, Context};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::ingest::{media_type_for_filename, parser, ExtractedData};

/// Read and parse a local spreadsheet, inferring the media type from the extension when not given
pub async fn load_workbook(path: &Path, media_type: Option<String>) -> anyhow::Result<ExtractedData> {
    let media_type = match media_type {
        Some(t) => t,
        None => path
            .to_str()
            .and_then(media_type_for_filename)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot infer media type of {}; pass --media-type", path.display()))?,
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    parser::parse(&bytes, &media_type).with_context(|| format!("failed to parse {}", path.display()))
}

/// Print a value as pretty JSON wrapped in a success envelope
pub fn output_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    let response = serde_json::json!({
        "success": true,
        "data": data
    });
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Print text lines, or the value as JSON
pub fn output<T: Serialize>(output_format: OutputFormat, data: &T, text: &[String]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_json(data),
        OutputFormat::Text => {
            for line in text {
                println!("{}", line);
            }
            Ok(())
        }
    }
}
