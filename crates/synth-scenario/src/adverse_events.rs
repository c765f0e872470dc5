//! Stage 7: adverse events correlated with abnormal vitals.

use synth_common::SynthRng;
use synth_common::rng::{bernoulli, choose_weighted};
use synth_model::{AdverseEvent, AeSeverity, Schema};

const BASE_RATE: f64 = 0.05;
const TREATED_MULTIPLIER: f64 = 1.5;
const MAX_PROBABILITY: f64 = 0.9;

const GENERAL_TERMS: &[(&str, f64)] = &[("Headache", 0.4), ("Nausea", 0.3), ("Fatigue", 0.3)];
const SEVERITIES: [AeSeverity; 3] = [AeSeverity::Mild, AeSeverity::Moderate, AeSeverity::Severe];

/// One attended visit, with the values measured before any masking.
#[derive(Debug, Clone, Copy)]
pub struct VisitObservation<'a> {
    pub subject_id: &'a str,
    pub arm: &'a str,
    pub visit: &'a str,
    pub treated: bool,
    pub values: &'a [f64],
}

/// The most abnormal variable of a visit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Abnormality {
    pub score: f64,
    pub column: Option<usize>,
    pub above_range: bool,
}

pub fn assess(columns: &[String], schema: &Schema, values: &[f64]) -> Abnormality {
    let mut worst = Abnormality {
        score: 0.0,
        column: None,
        above_range: false,
    };
    for (column, (name, value)) in columns.iter().zip(values).enumerate() {
        let Some(variable) = schema.variable(name) else {
            continue;
        };
        let score = variable.abnormality(*value);
        if score > worst.score {
            worst = Abnormality {
                score,
                column: Some(column),
                above_range: variable
                    .normal_range
                    .is_some_and(|range| *value > range.high),
            };
        }
    }
    worst
}

pub fn event_probability(treated: bool, abnormality: f64) -> f64 {
    let multiplier = if treated { TREATED_MULTIPLIER } else { 1.0 };
    (BASE_RATE * multiplier * (1.0 + 2.0 * abnormality.max(0.0))).min(MAX_PROBABILITY)
}

/// Abnormality of the visit and the event it triggered, if any.
pub fn simulate_visit(
    observation: &VisitObservation<'_>,
    columns: &[String],
    schema: &Schema,
    rng: &mut SynthRng,
) -> (Abnormality, Option<AdverseEvent>) {
    let abnormality = assess(columns, schema, observation.values);
    if !bernoulli(rng, event_probability(observation.treated, abnormality.score)) {
        return (abnormality, None);
    }
    let terms = match abnormality.column {
        Some(column) => terms_for(&columns[column], abnormality.above_range),
        None => GENERAL_TERMS,
    };
    let weights: Vec<f64> = terms.iter().map(|(_, weight)| *weight).collect();
    let term = terms[choose_weighted(rng, &weights)].0;
    let severity = SEVERITIES[choose_weighted(rng, &severity_weights(abnormality.score))];
    let event = AdverseEvent {
        subject_id: observation.subject_id.to_string(),
        visit: observation.visit.to_string(),
        arm: observation.arm.to_string(),
        term: term.to_string(),
        severity,
        abnormality: abnormality.score,
    };
    (abnormality, Some(event))
}

fn terms_for(variable: &str, above_range: bool) -> &'static [(&'static str, f64)] {
    match (variable, above_range) {
        ("SYSBP" | "DIABP", true) => &[("Hypertension", 0.8), ("Headache", 0.2)],
        ("SYSBP" | "DIABP", false) => &[("Hypotension", 0.6), ("Dizziness", 0.4)],
        ("PULSE", true) => &[("Tachycardia", 0.6), ("Palpitations", 0.4)],
        ("PULSE", false) => &[("Bradycardia", 0.8), ("Fatigue", 0.2)],
        ("TEMP", true) => &[("Pyrexia", 0.9), ("Chills", 0.1)],
        ("TEMP", false) => &[("Chills", 1.0)],
        _ => GENERAL_TERMS,
    }
}

/// Mild/moderate/severe weights shifting towards severe as abnormality grows.
fn severity_weights(abnormality: f64) -> [f64; 3] {
    if abnormality < 1.0 {
        [0.7, 0.25, 0.05]
    } else if abnormality < 2.0 {
        [0.4, 0.45, 0.15]
    } else {
        [0.2, 0.45, 0.35]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_common::{Stream, stream_rng};

    #[test]
    fn probability_rises_with_abnormality_and_treatment() {
        assert!((event_probability(false, 0.0) - 0.05).abs() < 1e-12);
        assert!((event_probability(true, 0.0) - 0.075).abs() < 1e-12);
        assert!((event_probability(false, 1.0) - 0.15).abs() < 1e-12);
        assert_eq!(event_probability(true, 50.0), MAX_PROBABILITY);
    }

    #[test]
    fn hypertensive_visits_report_hypertension_mostly() {
        let schema = Schema::vital_signs();
        let columns = schema.continuous_names();
        let values = [200.0, 80.0, 72.0, 36.8, 78.0];
        let observation = VisitObservation {
            subject_id: "SUBJ-0001",
            arm: "Active",
            visit: "Week 4",
            treated: true,
            values: &values,
        };
        let abnormality = assess(&columns, &schema, &values);
        assert_eq!(abnormality.column, Some(0));
        assert!(abnormality.above_range);

        let mut rng = stream_rng(6, Stream::AdverseEvents);
        let events: Vec<AdverseEvent> = (0..400)
            .filter_map(|_| simulate_visit(&observation, &columns, &schema, &mut rng).1)
            .collect();
        assert!(events.len() > 220);
        let hypertension = events.iter().filter(|e| e.term == "Hypertension").count();
        assert!(hypertension * 2 > events.len());
    }
}
