//! Subject-visit rows and the immutable dataset that owns them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynthError};
use crate::ids::DatasetFingerprint;
use crate::metadata::{DataFlag, DatasetMetadata};
use crate::schema::{ARM_FIELD, SITE_FIELD, SUBJECT_FIELD, Schema, VISIT_FIELD};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Num(f64),
    Cat(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(value) => Some(*value),
            Value::Cat(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Cat(value) => Some(value),
            Value::Num(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(value) => write!(f, "{value}"),
            Value::Cat(value) => f.write_str(value),
        }
    }
}

/// One subject at one visit.
///
/// A `None` entry in `values` marks the field as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub subject_id: String,
    pub site_id: String,
    pub arm: String,
    pub visit: String,
    pub values: BTreeMap<String, Option<Value>>,
}

impl Row {
    pub fn new(
        subject_id: impl Into<String>,
        site_id: impl Into<String>,
        arm: impl Into<String>,
        visit: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            site_id: site_id.into(),
            arm: arm.into(),
            visit: visit.into(),
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), Some(value));
        self
    }

    #[must_use]
    pub fn with_num(self, name: impl Into<String>, value: f64) -> Self {
        self.with_value(name, Value::Num(value))
    }

    #[must_use]
    pub fn with_cat(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(name, Value::Cat(value.into()))
    }

    #[must_use]
    pub fn with_missing(mut self, name: impl Into<String>) -> Self {
        self.values.insert(name.into(), None);
        self
    }

    /// Observed value of a variable; `None` when missing or absent.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(Option::as_ref)
    }

    pub fn num(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_f64)
    }

    pub fn is_missing(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(None))
    }

    /// Value of a variable or of one of the reserved identifier fields.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            SUBJECT_FIELD => Some(Value::Cat(self.subject_id.clone())),
            SITE_FIELD => Some(Value::Cat(self.site_id.clone())),
            ARM_FIELD => Some(Value::Cat(self.arm.clone())),
            VISIT_FIELD => Some(Value::Cat(self.visit.clone())),
            _ => self.value(name).cloned(),
        }
    }
}

/// An immutable collection of rows sharing one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Row>,
    #[serde(default)]
    metadata: DatasetMetadata,
}

impl Dataset {
    /// Build a dataset, checking every row against the schema.
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        for (index, row) in rows.iter().enumerate() {
            check_row(&schema, index, row)?;
        }
        Ok(Self {
            schema,
            rows,
            metadata: DatasetMetadata::default(),
        })
    }

    /// Same schema and metadata, new rows.
    pub fn with_rows(&self, rows: Vec<Row>) -> Result<Self> {
        let dataset = Self::new(self.schema.clone(), rows)?;
        Ok(dataset.with_metadata(self.metadata.clone()))
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: DatasetMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the producing generator fell back or did not converge.
    pub fn is_degraded(&self) -> bool {
        self.metadata.has_flag(DataFlag::Degraded) || self.metadata.has_flag(DataFlag::Unconverged)
    }

    /// Distinct visit labels in first-appearance order.
    pub fn visits(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|row| row.visit.as_str()))
    }

    /// Distinct arm labels in first-appearance order.
    pub fn arms(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|row| row.arm.as_str()))
    }

    pub fn subjects(&self) -> Vec<String> {
        distinct_in_order(self.rows.iter().map(|row| row.subject_id.as_str()))
    }

    /// Observed values of a numeric variable, in row order.
    pub fn numeric_column(&self, name: &str) -> Vec<f64> {
        self.rows.iter().filter_map(|row| row.num(name)).collect()
    }

    /// Observed values of a categorical variable, in row order.
    pub fn categorical_column(&self, name: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.value(name).and_then(Value::as_str))
            .collect()
    }

    /// Fraction of variable cells flagged missing.
    pub fn missing_rate(&self) -> f64 {
        let cells = self.rows.len() * self.schema.len();
        if cells == 0 {
            return 0.0;
        }
        let missing: usize = self
            .rows
            .iter()
            .map(|row| row.values.values().filter(|value| value.is_none()).count())
            .sum();
        missing as f64 / cells as f64
    }

    /// SHA-256 over the schema and every row.
    pub fn fingerprint(&self) -> DatasetFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.schema).as_bytes());
        for row in &self.rows {
            for field in [&row.subject_id, &row.site_id, &row.arm, &row.visit] {
                hasher.update(field.as_bytes());
                hasher.update([0x1f]);
            }
            for (name, value) in &row.values {
                hasher.update(name.as_bytes());
                match value {
                    Some(Value::Num(number)) => {
                        hasher.update([1]);
                        hasher.update(number.to_bits().to_le_bytes());
                    }
                    Some(Value::Cat(level)) => {
                        hasher.update([2]);
                        hasher.update(level.as_bytes());
                    }
                    None => hasher.update([0]),
                }
            }
            hasher.update([0x1e]);
        }
        DatasetFingerprint::from_digest(hasher.finalize().into())
    }
}

fn distinct_in_order<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for value in values {
        if seen.insert(value) {
            ordered.push(value.to_string());
        }
    }
    ordered
}

fn check_row(schema: &Schema, index: usize, row: &Row) -> Result<()> {
    let mismatch = |message: String| SynthError::SchemaMismatch {
        row: index,
        message,
    };
    if let Some(extra) = row
        .values
        .keys()
        .find(|name| schema.variable(name).is_none())
    {
        return Err(mismatch(format!("unknown variable {extra}")));
    }
    for variable in &schema.variables {
        match row.values.get(&variable.name) {
            None => return Err(mismatch(format!("variable {} absent", variable.name))),
            Some(None) => {}
            Some(Some(value)) => {
                if !variable.admits(value) {
                    return Err(mismatch(format!(
                        "value {value} not valid for {}",
                        variable.name
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::VariableSpec;

    fn schema() -> Schema {
        Schema::new(vec![
            VariableSpec::continuous("X", 0.0, 10.0, 1),
            VariableSpec::categorical("SEX", ["F", "M"]),
        ])
        .expect("schema")
    }

    #[test]
    fn rejects_out_of_range_values() {
        let row = Row::new("S1", "01", "A", "V1")
            .with_num("X", 11.0)
            .with_cat("SEX", "F");
        let err = Dataset::new(schema(), vec![row]).unwrap_err();
        assert!(matches!(err, SynthError::SchemaMismatch { row: 0, .. }));
    }

    #[test]
    fn rejects_absent_and_unknown_variables() {
        let absent = Row::new("S1", "01", "A", "V1").with_num("X", 1.0);
        assert!(Dataset::new(schema(), vec![absent]).is_err());

        let unknown = Row::new("S1", "01", "A", "V1")
            .with_num("X", 1.0)
            .with_cat("SEX", "F")
            .with_num("Y", 2.0);
        assert!(Dataset::new(schema(), vec![unknown]).is_err());
    }

    #[test]
    fn missing_cells_count_toward_missing_rate() {
        let rows = vec![
            Row::new("S1", "01", "A", "V1")
                .with_missing("X")
                .with_cat("SEX", "F"),
            Row::new("S2", "01", "A", "V1")
                .with_num("X", 2.0)
                .with_cat("SEX", "M"),
        ];
        let dataset = Dataset::new(schema(), rows).expect("dataset");
        assert!((dataset.missing_rate() - 0.25).abs() < 1e-12);
        assert_eq!(dataset.numeric_column("X"), vec![2.0]);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let row = Row::new("S1", "01", "A", "V1")
            .with_num("X", 1.0)
            .with_cat("SEX", "F");
        let first = Dataset::new(schema(), vec![row.clone()]).expect("dataset");
        let same = Dataset::new(schema(), vec![row.clone()]).expect("dataset");
        let changed = Dataset::new(schema(), vec![row.with_num("X", 1.5)]).expect("dataset");
        assert_eq!(first.fingerprint(), same.fingerprint());
        assert_ne!(first.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn visits_keep_first_appearance_order() {
        let rows = ["Week 4", "Baseline", "Week 4", "Week 8"]
            .iter()
            .enumerate()
            .map(|(i, visit)| {
                Row::new(format!("S{i}"), "01", "A", *visit)
                    .with_num("X", 1.0)
                    .with_cat("SEX", "F")
            })
            .collect();
        let dataset = Dataset::new(schema(), rows).expect("dataset");
        assert_eq!(dataset.visits(), vec!["Week 4", "Baseline", "Week 8"]);
    }
}
