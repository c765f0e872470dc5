//! Schema inference from raw CSV columns.

use std::collections::BTreeSet;

use synth_model::{Schema, VariableSpec};
use tracing::{debug, warn};

/// Cell contents treated as a missing observation (case-insensitive).
pub const MISSING_TOKENS: [&str; 6] = ["", "NA", "N/A", "NAN", ".", "NULL"];

/// Largest number of decimal places an inferred variable keeps.
const MAX_PRECISION: u32 = 6;

pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| token.eq_ignore_ascii_case(cell))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferOptions {
    /// Columns with more distinct text values than this are skipped.
    pub max_levels: usize,
    /// Fraction of the observed span added on both sides of a numeric
    /// column's valid range.
    pub range_padding: f64,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            max_levels: 50,
            range_padding: 0.1,
        }
    }
}

fn decimals(cell: &str) -> u32 {
    let mantissa = cell.split(['e', 'E']).next().unwrap_or(cell);
    mantissa
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.len() as u32)
        .min(MAX_PRECISION)
}

/// Build a continuous spec covering `observed`, reusing the built-in
/// vital-sign definition of the same name when there is one.
fn continuous(name: &str, observed: &[(f64, u32)], padding: f64) -> VariableSpec {
    let low = observed.iter().map(|(value, _)| *value).fold(f64::INFINITY, f64::min);
    let high = observed.iter().map(|(value, _)| *value).fold(f64::NEG_INFINITY, f64::max);
    let precision = observed.iter().map(|(_, places)| *places).max().unwrap_or(0);

    if let Some(known) = Schema::vital_signs().variable(&name.to_ascii_uppercase())
        && let Some((min, max)) = known.valid_range()
    {
        let mut spec = known.clone();
        spec.name = name.to_string();
        if low < min || high > max {
            let mut widened =
                VariableSpec::continuous(name, low.min(min), high.max(max), spec.precision());
            widened.unit = spec.unit;
            widened.normal_range = spec.normal_range;
            widened.prior = spec.prior;
            return widened;
        }
        return spec;
    }

    let span = high - low;
    let pad = if span > 0.0 {
        span * padding
    } else {
        (low.abs() * padding).max(1.0)
    };
    VariableSpec::continuous(name, low - pad, high + pad, precision)
}

/// Infer one variable per column from its non-missing cells.
///
/// A column whose every observed cell parses as a finite number becomes
/// continuous; the rest become categorical with sorted levels. Columns
/// with no observations or too many levels are skipped.
pub fn infer_variable(name: &str, cells: &[&str], options: &InferOptions) -> Option<VariableSpec> {
    let observed: Vec<&str> = cells
        .iter()
        .map(|cell| cell.trim())
        .filter(|cell| !is_missing(cell))
        .collect();
    if observed.is_empty() {
        warn!(column = name, "column has no observed values; skipped");
        return None;
    }
    let numeric: Option<Vec<(f64, u32)>> = observed
        .iter()
        .map(|cell| {
            cell.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(|value| (value, decimals(cell)))
        })
        .collect();
    if let Some(numeric) = numeric {
        let spec = continuous(name, &numeric, options.range_padding);
        debug!(
            column = name,
            range = ?spec.valid_range(),
            precision = spec.precision(),
            "inferred continuous"
        );
        return Some(spec);
    }
    let levels: BTreeSet<&str> = observed.into_iter().collect();
    if levels.len() > options.max_levels {
        warn!(
            column = name,
            levels = levels.len(),
            max_levels = options.max_levels,
            "too many distinct values for a categorical variable; skipped"
        );
        return None;
    }
    debug!(column = name, levels = levels.len(), "inferred categorical");
    Some(VariableSpec::categorical(name, levels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tokens_are_case_insensitive() {
        for cell in ["", " ", "NA", "na", "NaN", ".", "null", "N/A"] {
            assert!(is_missing(cell), "{cell:?}");
        }
        assert!(!is_missing("0"));
        assert!(!is_missing("Placebo"));
    }

    #[test]
    fn numeric_columns_get_padded_ranges_and_precision() {
        let spec = infer_variable("LDL", &["100", "120.25", "NA", "150"], &InferOptions::default())
            .expect("variable");
        let (min, max) = spec.valid_range().expect("continuous");
        assert!((min - 95.0).abs() < 1e-9 && (max - 155.0).abs() < 1e-9, "{min} {max}");
        assert_eq!(spec.precision(), 2);
    }

    #[test]
    fn vital_signs_keep_their_clinical_definition() {
        let spec = infer_variable("SYSBP", &["118", "131", "142"], &InferOptions::default())
            .expect("variable");
        assert_eq!(spec.valid_range(), Some((70.0, 220.0)));
        assert!(spec.normal_range.is_some());

        let wide = infer_variable("SYSBP", &["65", "131"], &InferOptions::default())
            .expect("variable");
        assert_eq!(wide.valid_range(), Some((65.0, 220.0)));
        assert_eq!(wide.unit.as_deref(), Some("mmHg"));
    }

    #[test]
    fn text_columns_become_sorted_levels() {
        let spec = infer_variable("SEX", &["M", "F", "", "M"], &InferOptions::default())
            .expect("variable");
        assert_eq!(spec.levels(), ["F", "M"]);

        let options = InferOptions {
            max_levels: 2,
            ..InferOptions::default()
        };
        assert!(infer_variable("NOTE", &["a", "b", "c"], &options).is_none());
        assert!(infer_variable("EMPTY", &["", "NA"], &options).is_none());
    }
}
