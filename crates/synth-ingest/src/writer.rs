//! Dataset and report export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use synth_model::{
    ARM_FIELD, Dataset, SITE_FIELD, SUBJECT_FIELD, VISIT_FIELD, Value, VariableSpec,
};
use tracing::info;

use crate::error::{IngestError, Result};

fn render(variable: Option<&VariableSpec>, value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Num(number)) => {
            let precision = variable.map_or(0, VariableSpec::precision) as usize;
            format!("{number:.precision$}")
        }
        Some(Value::Cat(level)) => level.clone(),
    }
}

fn write_records<W: Write>(dataset: &Dataset, writer: &mut csv::Writer<W>) -> csv::Result<()> {
    let schema = dataset.schema();
    let mut header = vec![SUBJECT_FIELD, SITE_FIELD, ARM_FIELD, VISIT_FIELD];
    header.extend(schema.names());
    writer.write_record(&header)?;
    for row in dataset.rows() {
        let mut record = vec![
            row.subject_id.clone(),
            row.site_id.clone(),
            row.arm.clone(),
            row.visit.clone(),
        ];
        record.extend(
            schema
                .variables
                .iter()
                .map(|variable| render(Some(variable), row.value(&variable.name))),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render `dataset` as CSV: identifiers first, then schema variables.
/// Missing cells are empty; numbers keep their variable's precision.
pub fn to_csv_string(dataset: &Dataset) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let stream = Path::new("<memory>");
    write_records(dataset, &mut writer).map_err(|source| IngestError::Csv {
        path: stream.to_path_buf(),
        source,
    })?;
    let bytes = writer.into_inner().map_err(|error| IngestError::FileWrite {
        path: stream.to_path_buf(),
        source: error.into_error(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| IngestError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    write_records(dataset, &mut writer).map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rows = dataset.len(), "dataset written");
    Ok(())
}

/// Pretty-printed JSON of any serialisable value (datasets, reports).
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| IngestError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| IngestError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "JSON written");
    Ok(())
}

/// Write `dataset` as JSON when `path` ends in `.json`, CSV otherwise.
pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    let is_json = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if is_json {
        write_json(dataset, path)
    } else {
        write_csv(dataset, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Row, Schema};

    #[test]
    fn csv_keeps_precision_and_blanks_missing_cells() {
        let schema = Schema::new(vec![
            VariableSpec::continuous("TEMP", 34.5, 41.5, 1),
            VariableSpec::categorical("SEX", ["F", "M"]),
        ])
        .expect("schema");
        let rows = vec![
            Row::new("SUBJ-0001", "SITE-01", "Placebo", "Baseline")
                .with_num("TEMP", 36.8)
                .with_cat("SEX", "F"),
            Row::new("SUBJ-0001", "SITE-01", "Placebo", "Week 4")
                .with_missing("TEMP")
                .with_cat("SEX", "F"),
        ];
        let dataset = Dataset::new(schema, rows).expect("dataset");
        insta::assert_snapshot!(to_csv_string(&dataset).expect("csv"), @r"
        USUBJID,SITEID,ARM,VISIT,TEMP,SEX
        SUBJ-0001,SITE-01,Placebo,Baseline,36.8,F
        SUBJ-0001,SITE-01,Placebo,Week 4,,F
        ");
    }
}
