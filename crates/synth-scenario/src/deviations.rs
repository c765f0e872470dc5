//! Stage 6: protocol deviations.

use rand::Rng;
use rand::seq::SliceRandom;
use synth_common::SynthRng;
use synth_common::rng::choose_weighted;
use synth_model::{DeviationKind, ProtocolDeviation};

const KINDS: [DeviationKind; 3] = [
    DeviationKind::EligibilityViolation,
    DeviationKind::VisitWindowViolation,
    DeviationKind::ProhibitedMedication,
];
const KIND_WEIGHTS: [f64; 3] = [0.2, 0.5, 0.3];
const MAX_EVENTS_PER_SUBJECT: usize = 3;
const VISIT_WINDOW_DAYS: u32 = 3;
const PROHIBITED_MEDICATIONS: [&str; 4] = [
    "ibuprofen",
    "pseudoephedrine",
    "St John's wort",
    "prednisone",
];

/// A subject as seen by the deviation stage: the visits actually attended.
#[derive(Debug, Clone, Copy)]
pub struct AttendedVisits<'a> {
    pub subject_id: &'a str,
    pub visits: &'a [String],
}

/// Pick `round(rate * n)` subjects and give each one to three deviations.
pub fn generate_deviations(
    subjects: &[AttendedVisits<'_>],
    rate: f64,
    rng: &mut SynthRng,
) -> Vec<ProtocolDeviation> {
    let target = (rate.clamp(0.0, 1.0) * subjects.len() as f64).round() as usize;
    let mut order: Vec<usize> = (0..subjects.len()).collect();
    order.shuffle(rng);
    let mut chosen: Vec<usize> = order.into_iter().take(target).collect();
    chosen.sort_unstable();

    let mut deviations = Vec::new();
    for index in chosen {
        let subject = subjects[index];
        let Some(first_visit) = subject.visits.first() else {
            continue;
        };
        let events = rng.random_range(1..=MAX_EVENTS_PER_SUBJECT);
        for _ in 0..events {
            let kind = KINDS[choose_weighted(rng, &KIND_WEIGHTS)];
            let visit = match kind {
                DeviationKind::EligibilityViolation => first_visit,
                _ => &subject.visits[rng.random_range(0..subject.visits.len())],
            };
            let description = describe(kind, visit, rng);
            deviations.push(ProtocolDeviation {
                subject_id: subject.subject_id.to_string(),
                visit: visit.clone(),
                kind,
                description,
            });
        }
    }
    deviations
}

fn describe(kind: DeviationKind, visit: &str, rng: &mut SynthRng) -> String {
    match kind {
        DeviationKind::EligibilityViolation => format!(
            "Inclusion criterion {} not met at screening",
            rng.random_range(1..=8)
        ),
        DeviationKind::VisitWindowViolation => format!(
            "{visit} performed {} days outside the +/-{VISIT_WINDOW_DAYS} day window",
            rng.random_range(1..=10)
        ),
        DeviationKind::ProhibitedMedication => format!(
            "Prohibited medication ({}) taken before {visit}",
            PROHIBITED_MEDICATIONS[rng.random_range(0..PROHIBITED_MEDICATIONS.len())]
        ),
    }
}
