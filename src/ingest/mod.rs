// Spreadsheet ingestion: parse uploaded workbooks, track the upload record,
// and project the first sheet into chart data.

pub mod parser;
pub mod pipeline;
pub mod projector;
pub mod record;
pub mod store;

pub use parser::{media_type_for_filename, CellValue, ExtractedData, ParseError, SheetData, SheetSummary, SUPPORTED_MEDIA_TYPES};
pub use pipeline::{IncomingFile, IngestError, IngestOutcome, IngestPipeline};
pub use projector::{ChartProjection, Dataset};
pub use record::{NewUpload, TransitionError, UploadRecord, UploadState, UploadStatus};
pub use store::{UploadStore, UserCounter};
