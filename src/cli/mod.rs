pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetctl")]
#[command(about = "Run the spreadsheet parser and chart projector against local files")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Parse a workbook and print its sheet summary")]
    Parse {
        #[arg(help = "Path to an .xlsx, .xls or .csv file")]
        path: PathBuf,

        #[arg(long, help = "Declared media type; defaults from the file extension")]
        media_type: Option<String>,
    },

    #[command(about = "Parse a workbook and print the chart projection of its first sheet")]
    Project {
        #[arg(help = "Path to an .xlsx, .xls or .csv file")]
        path: PathBuf,

        #[arg(long, help = "Declared media type; defaults from the file extension")]
        media_type: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Parse { path, media_type } => commands::parse::handle(&path, media_type, output_format).await,
        Commands::Project { path, media_type } => commands::project::handle(&path, media_type, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["sheetctl", "parse", "a.csv", "--json"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Parse { media_type: None, .. }));

        let cli = Cli::try_parse_from(["sheetctl", "project", "a.bin", "--media-type", "text/csv"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Text);
        assert!(matches!(cli.command, Commands::Project { media_type: Some(ref t), .. } if t == "text/csv"));
    }

    #[test]
    fn path_is_required() {
        assert!(Cli::try_parse_from(["sheetctl", "parse"]).is_err());
    }
}
