//! Quasi-identifier resolution and pre-encoded record matrices.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use synth_model::{Dataset, RESERVED_FIELDS, SITE_FIELD, Value};

use crate::config::PrivacyConfig;

/// One encoded quasi-identifier value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Num(f64),
    /// Index into the attribute's shared level dictionary.
    Cat(u32),
    Missing,
}

/// Hashable form of a [`Cell`], for equality grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    Num(u64),
    Cat(u32),
    Missing,
}

impl Cell {
    pub fn key(self) -> CellKey {
        match self {
            // Normalise -0.0 so it groups with 0.0.
            Cell::Num(value) => CellKey::Num((value + 0.0).to_bits()),
            Cell::Cat(code) => CellKey::Cat(code),
            Cell::Missing => CellKey::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuasiIdentifier {
    pub name: String,
    pub numeric: bool,
    /// Reference range used to scale numeric distances.
    pub span: f64,
}

/// Both datasets projected onto their shared quasi-identifiers.
#[derive(Debug, Clone)]
pub struct EncodedPair {
    pub attributes: Vec<QuasiIdentifier>,
    pub reference: Vec<Vec<Cell>>,
    pub candidate: Vec<Vec<Cell>>,
}

/// Kind of an attribute in `dataset`: `Some(true)` numeric, `Some(false)`
/// categorical, `None` absent.
fn attribute_kind(dataset: &Dataset, name: &str) -> Option<bool> {
    if RESERVED_FIELDS.contains(&name) {
        return Some(false);
    }
    dataset.schema().variable(name).map(|variable| variable.is_continuous())
}

/// Configured quasi-identifiers present in both datasets with the same kind.
///
/// An empty configuration selects the site and every shared categorical
/// variable.
pub fn shared_quasi_identifiers(
    config: &PrivacyConfig,
    reference: &Dataset,
    candidate: &Dataset,
) -> Vec<(String, bool)> {
    let requested: Vec<String> = if config.quasi_identifiers.is_empty() {
        std::iter::once(SITE_FIELD.to_string())
            .chain(
                reference
                    .schema()
                    .categorical()
                    .map(|variable| variable.name.clone()),
            )
            .collect()
    } else {
        config.quasi_identifiers.clone()
    };
    let mut seen = BTreeSet::new();
    requested
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .filter_map(|name| {
            let kind = attribute_kind(reference, &name)?;
            (attribute_kind(candidate, &name)? == kind).then_some((name, kind))
        })
        .collect()
}

/// The explicit sensitive attribute when shared, else the first shared
/// continuous variable that is not a quasi-identifier.
pub fn sensitive_attribute(
    config: &PrivacyConfig,
    reference: &Dataset,
    candidate: &Dataset,
    quasi_identifiers: &[(String, bool)],
) -> Option<String> {
    let shared = |name: &str| {
        attribute_kind(reference, name).is_some()
            && attribute_kind(reference, name) == attribute_kind(candidate, name)
    };
    match &config.sensitive_attribute {
        Some(name) => shared(name).then(|| name.clone()),
        None => reference
            .schema()
            .continuous()
            .map(|variable| variable.name.as_str())
            .find(|name| shared(name) && !quasi_identifiers.iter().any(|(qi, _)| qi == name))
            .map(str::to_string),
    }
}

fn generalize(value: f64, width: Option<f64>) -> f64 {
    match width {
        Some(width) => (value / width).floor() * width,
        None => value,
    }
}

impl EncodedPair {
    pub fn encode(
        config: &PrivacyConfig,
        reference: &Dataset,
        candidate: &Dataset,
        quasi_identifiers: &[(String, bool)],
    ) -> Self {
        let mut dictionaries: Vec<BTreeMap<String, u32>> =
            vec![BTreeMap::new(); quasi_identifiers.len()];
        for (dictionary, (name, numeric)) in dictionaries.iter_mut().zip(quasi_identifiers) {
            if *numeric {
                continue;
            }
            let levels: BTreeSet<String> = reference
                .rows()
                .iter()
                .chain(candidate.rows())
                .filter_map(|row| row.field(name))
                .map(|value| value.to_string())
                .collect();
            *dictionary = levels.into_iter().zip(0..).collect();
        }

        let attributes = quasi_identifiers
            .iter()
            .map(|(name, numeric)| {
                let values = if *numeric {
                    reference.numeric_column(name)
                } else {
                    Vec::new()
                };
                let (low, high) = values
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
                        (low.min(*value), high.max(*value))
                    });
                let span = if high > low { high - low } else { 1.0 };
                QuasiIdentifier {
                    name: name.clone(),
                    numeric: *numeric,
                    span,
                }
            })
            .collect();

        let encode_rows = |dataset: &Dataset| -> Vec<Vec<Cell>> {
            dataset
                .rows()
                .iter()
                .map(|row| {
                    quasi_identifiers
                        .iter()
                        .zip(&dictionaries)
                        .map(|((name, numeric), dictionary)| match row.field(name) {
                            None => Cell::Missing,
                            Some(Value::Num(value)) if *numeric => Cell::Num(generalize(
                                value,
                                config.generalization.get(name).copied(),
                            )),
                            Some(value) => dictionary
                                .get(&value.to_string())
                                .map_or(Cell::Missing, |code| Cell::Cat(*code)),
                        })
                        .collect()
                })
                .collect()
        };

        Self {
            attributes,
            reference: encode_rows(reference),
            candidate: encode_rows(candidate),
        }
    }

    pub fn width(&self) -> usize {
        self.attributes.len()
    }

    /// Mixed distance over `columns`: scaled absolute difference for
    /// numeric cells, 0/1 mismatch otherwise.
    pub fn distance(&self, left: &[Cell], right: &[Cell], columns: &[usize]) -> f64 {
        columns
            .iter()
            .map(|&column| match (left[column], right[column]) {
                (Cell::Num(a), Cell::Num(b)) => {
                    ((a - b).abs() / self.attributes[column].span).min(1.0)
                }
                (Cell::Cat(a), Cell::Cat(b)) => f64::from(u8::from(a != b)),
                (Cell::Missing, Cell::Missing) => 0.0,
                _ => 1.0,
            })
            .sum()
    }

    /// Candidate rows at the minimal distance from `target` over `columns`.
    pub fn nearest_candidates(&self, target: &[Cell], columns: &[usize]) -> Vec<usize> {
        let mut best = f64::INFINITY;
        let mut nearest = Vec::new();
        for (index, row) in self.candidate.iter().enumerate() {
            let distance = self.distance(target, row, columns);
            if distance < best - 1e-12 {
                best = distance;
                nearest.clear();
                nearest.push(index);
            } else if (distance - best).abs() <= 1e-12 {
                nearest.push(index);
            }
        }
        nearest
    }
}

/// Projected key of `row` over the attributes selected by `columns`.
pub fn projected_key(row: &[Cell], columns: &[usize]) -> Vec<CellKey> {
    columns.iter().map(|&column| row[column].key()).collect()
}

/// Row counts per projected key.
pub fn key_counts(rows: &[Vec<Cell>], columns: &[usize]) -> HashMap<Vec<CellKey>, usize> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(projected_key(row, columns)).or_insert(0) += 1;
    }
    counts
}
