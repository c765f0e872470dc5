//! Reference dataset loading and result export.
//!
//! - **CSV loading**: one row per subject visit with `USUBJID`, `ARM`,
//!   `VISIT` and optional `SITEID` identifier columns
//! - **Schemas**: inferred from the columns or loaded from a JSON file
//! - **Writers**: datasets as CSV or JSON, reports as JSON

mod error;
mod infer;
mod reader;
mod writer;

pub use error::{IngestError, Result};
pub use infer::{InferOptions, MISSING_TOKENS, infer_variable, is_missing};
pub use reader::{ReadOptions, load_schema, read_reference, read_reference_from};
pub use writer::{to_csv_string, write_csv, write_dataset, write_json};
