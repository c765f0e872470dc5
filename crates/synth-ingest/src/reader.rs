//! CSV reference loading.
//!
//! Every row is one subject at one visit. `USUBJID`, `ARM` and `VISIT`
//! columns are required, `SITEID` is optional; the remaining columns are
//! variables, typed by a JSON schema file or inferred from the data.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use synth_model::{
    ARM_FIELD, Dataset, RESERVED_FIELDS, Row, SITE_FIELD, SUBJECT_FIELD, Schema, VISIT_FIELD,
    Value, VariableKind,
};
use tracing::{debug, info, info_span};

use crate::error::{IngestError, Result};
use crate::infer::{InferOptions, infer_variable, is_missing};

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Explicit schema; inferred from the columns when absent.
    pub schema: Option<Schema>,
    pub infer: InferOptions,
    /// Site assigned to every row when the file has no `SITEID` column.
    pub default_site: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            schema: None,
            infer: InferOptions::default(),
            default_site: "01".to_string(),
        }
    }
}

impl ReadOptions {
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Load a schema from a JSON file holding `{"variables": [...]}`.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let file = File::open(path).map_err(|source| IngestError::read(path, source))?;
    let parsed: Schema =
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
            IngestError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
    parsed.check()?;
    Ok(parsed)
}

/// Read a reference dataset from a CSV file.
pub fn read_reference(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    let file = File::open(path).map_err(|source| IngestError::read(path, source))?;
    read_reference_from(file, path, options)
}

/// Read a reference dataset from any CSV source; `source` names it in errors.
pub fn read_reference_from<R: Read>(
    reader: R,
    source: &Path,
    options: &ReadOptions,
) -> Result<Dataset> {
    let span = info_span!("read_reference", path = %source.display());
    let _guard = span.enter();

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let csv_error = |source_error: csv::Error| IngestError::Csv {
        path: source.to_path_buf(),
        source: source_error,
    };
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|header| header.trim_matches('\u{feff}').trim().to_string())
        .collect();
    let records = reader
        .records()
        .collect::<std::result::Result<Vec<StringRecord>, csv::Error>>()
        .map_err(csv_error)?;
    if headers.iter().all(String::is_empty) || records.is_empty() {
        return Err(IngestError::EmptyCsv {
            path: source.to_path_buf(),
        });
    }

    let table = Table {
        path: source.to_path_buf(),
        headers,
        records,
    };
    let subject = table.require(SUBJECT_FIELD)?;
    let arm = table.require(ARM_FIELD)?;
    let visit = table.require(VISIT_FIELD)?;
    let site = table.column(SITE_FIELD);

    let schema = match &options.schema {
        Some(schema) => schema.clone(),
        None => table.infer_schema(&options.infer)?,
    };
    let columns = schema
        .variables
        .iter()
        .map(|variable| Ok((variable, table.require(&variable.name)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(table.records.len());
    for record in &table.records {
        let line = record.position().map_or(0, csv::Position::line);
        let identifier = |index: usize, field: &str| -> Result<String> {
            let cell = record.get(index).unwrap_or_default();
            if is_missing(cell) {
                return Err(table.invalid(field, cell, line));
            }
            Ok(cell.to_string())
        };
        let site_id = match site {
            Some(index) => identifier(index, SITE_FIELD)?,
            None => options.default_site.clone(),
        };
        let mut row = Row::new(
            identifier(subject, SUBJECT_FIELD)?,
            site_id,
            identifier(arm, ARM_FIELD)?,
            identifier(visit, VISIT_FIELD)?,
        );
        for (variable, index) in &columns {
            let cell = record.get(*index).unwrap_or_default();
            if is_missing(cell) {
                row = row.with_missing(variable.name.as_str());
                continue;
            }
            let value = match variable.kind {
                VariableKind::Continuous { .. } => Value::Num(
                    cell.parse::<f64>()
                        .map_err(|_| table.invalid(&variable.name, cell, line))?,
                ),
                VariableKind::Categorical { .. } => Value::Cat(cell.to_string()),
            };
            row = row.with_value(variable.name.as_str(), value);
        }
        rows.push(row);
    }

    let dataset = Dataset::new(schema, rows)?;
    info!(
        rows = dataset.len(),
        subjects = dataset.subjects().len(),
        variables = dataset.schema().len(),
        missing_rate = dataset.missing_rate(),
        "reference loaded"
    );
    Ok(dataset)
}

struct Table {
    path: PathBuf,
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl Table {
    /// Reserved fields match case-insensitively, variables exactly.
    fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .or_else(|| {
                self.headers
                    .iter()
                    .position(|header| header.eq_ignore_ascii_case(name) && is_reserved(name))
            })
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.column(name).ok_or_else(|| IngestError::MissingColumn {
            column: name.to_string(),
            path: self.path.clone(),
        })
    }

    fn invalid(&self, field: &str, value: &str, line: u64) -> IngestError {
        IngestError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            line,
            path: self.path.clone(),
        }
    }

    fn infer_schema(&self, options: &InferOptions) -> Result<Schema> {
        let mut variables = Vec::new();
        for (index, header) in self.headers.iter().enumerate() {
            if header.is_empty() || is_reserved(header) {
                continue;
            }
            let cells: Vec<&str> = self
                .records
                .iter()
                .map(|record| record.get(index).unwrap_or_default())
                .collect();
            if let Some(variable) = infer_variable(header, &cells, options) {
                variables.push(variable);
            }
        }
        if variables.is_empty() {
            return Err(IngestError::SchemaInference {
                path: self.path.clone(),
                reason: "no column besides the identifiers holds usable values".to_string(),
            });
        }
        debug!(variables = variables.len(), "schema inferred");
        Ok(Schema::new(variables)?)
    }
}

fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(name))
}
