//! The realistic-scenario generator: eight stages run in a fixed order.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rayon::prelude::*;
use synth_common::{Stream, site_label, stream_rng, subject_label, substream_rng};
use synth_model::{
    AdverseEvent, DataFlag, Dataset, DatasetMetadata, DropoutRecord, EnrollmentRecord,
    GenerationConfig, GenerationMethod, RealizedMetrics, Result, Row, ScenarioArtifacts, Schema,
};
use tracing::{debug, info, info_span, warn};

use crate::adverse_events::{VisitObservation, simulate_visit};
use crate::baseline::{BaselineFit, BaselineModel};
use crate::deviations::{AttendedVisits, generate_deviations};
use crate::enrollment::schedule_enrollment;
use crate::missing::inject_missing;
use crate::realism::{RealismTargets, point_biserial, score_realism};
use crate::sites::{allocate_sites, site_effects};
use crate::trajectory::{TrajectoryContext, calibrate_hazards, simulate_subject};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioGenerator;

/// A randomised subject before any visit is simulated.
#[derive(Debug, Clone)]
struct PlannedSubject {
    subject_id: String,
    site: usize,
    treated: bool,
}

#[derive(Debug, Default)]
struct ChunkOutput {
    rows: Vec<Row>,
    dropouts: Vec<DropoutRecord>,
    adverse_events: Vec<AdverseEvent>,
    /// `(visit abnormality, had an event)` per attended visit.
    ae_pairs: Vec<(f64, bool)>,
    /// Visits attended by each subject of the chunk, in chunk order.
    attended: Vec<(String, Vec<String>)>,
}

/// Read-only inputs of the chunked stages.
struct ChunkInputs<'a> {
    seed: u64,
    context: TrajectoryContext<'a>,
    schema: &'a Schema,
    visits: &'a [String],
    visit_index: &'a BTreeMap<String, usize>,
    config: &'a GenerationConfig,
}

impl ScenarioGenerator {
    /// Simulate `2 * n_per_arm` subjects over the visit schedule.
    ///
    /// Without a reference the schema (configured, else the built-in vital
    /// signs) supplies the baseline priors.
    pub fn generate(
        &self,
        reference: Option<&Dataset>,
        config: &GenerationConfig,
    ) -> Result<Dataset> {
        let span = info_span!("scenario", seed = config.seed, n_per_arm = config.n_per_arm);
        let _guard = span.enter();

        let schema = reference
            .map(|reference| reference.schema().clone())
            .or_else(|| config.schema.clone())
            .unwrap_or_else(Schema::vital_signs);
        let visits = config.visit_schedule(reference);
        let visit_index: BTreeMap<String, usize> = visits
            .iter()
            .enumerate()
            .map(|(index, visit)| (visit.clone(), index))
            .collect();
        let effect_variable = config.resolve_effect_variable(&schema)?;
        let BaselineFit { model, fallback } = BaselineModel::fit(&schema, reference);
        if let Some(reason) = &fallback {
            warn!(reason = %reason, "scenario baseline degraded");
        }
        let effect_column = effect_variable
            .as_ref()
            .and_then(|name| model.columns.iter().position(|column| column == name));

        let n_subjects = 2 * config.n_per_arm;
        let seed = config.seed;

        let mut enrollment_rng = stream_rng(seed, Stream::Enrollment);
        let dates = schedule_enrollment(
            n_subjects,
            config.enrollment_pattern,
            config.study_start,
            config.enrollment_days,
            &mut enrollment_rng,
        );
        let mut treated: Vec<bool> = (0..n_subjects).map(|i| i >= config.n_per_arm).collect();
        treated.shuffle(&mut enrollment_rng);
        debug!(subjects = n_subjects, "enrollment scheduled");

        let allocation = allocate_sites(
            n_subjects,
            config.n_sites,
            config.site_heterogeneity,
            &mut stream_rng(seed, Stream::SiteAllocation),
        );
        debug!(sizes = ?allocation.sizes, "sites allocated");
        let effects = site_effects(
            config.n_sites,
            &model.sd,
            config.site_heterogeneity,
            &mut stream_rng(seed, Stream::SiteEffects),
        );
        let hazards = calibrate_hazards(
            config.dropout_pattern,
            visits.len().saturating_sub(1),
            config.dropout_rate,
        );

        let subjects: Vec<PlannedSubject> = (0..n_subjects)
            .map(|ordinal| PlannedSubject {
                subject_id: subject_label(ordinal),
                site: allocation.assignment[ordinal],
                treated: treated[ordinal],
            })
            .collect();
        let enrollment: Vec<EnrollmentRecord> = subjects
            .iter()
            .zip(&dates)
            .map(|(subject, date)| EnrollmentRecord {
                subject_id: subject.subject_id.clone(),
                site_id: site_label(subject.site),
                arm: arm_label(config, subject.treated).to_string(),
                enrolled_on: *date,
            })
            .collect();

        let inputs = ChunkInputs {
            seed,
            context: TrajectoryContext {
                model: &model,
                schema: &schema,
                visit_count: visits.len(),
                hazards: &hazards,
                effect_column,
                target_effect: config.target_effect,
                site_effects: &effects,
            },
            schema: &schema,
            visits: &visits,
            visit_index: &visit_index,
            config,
        };
        let chunks: Vec<ChunkOutput> = subjects
            .par_chunks(config.chunk_size)
            .enumerate()
            .map(|(index, chunk)| simulate_chunk(&inputs, index as u64, chunk))
            .collect();
        debug!(chunks = chunks.len(), "trajectories simulated");

        let mut output = ChunkOutput::default();
        for chunk in chunks {
            output.rows.extend(chunk.rows);
            output.dropouts.extend(chunk.dropouts);
            output.adverse_events.extend(chunk.adverse_events);
            output.ae_pairs.extend(chunk.ae_pairs);
            output.attended.extend(chunk.attended);
        }

        let attended: Vec<AttendedVisits<'_>> = output
            .attended
            .iter()
            .map(|(subject_id, visits)| AttendedVisits { subject_id, visits })
            .collect();
        let deviations = generate_deviations(
            &attended,
            config.deviation_rate,
            &mut stream_rng(seed, Stream::Deviations),
        );

        let dataset = Dataset::new(schema, output.rows)?;
        let deviating: BTreeSet<&str> = deviations
            .iter()
            .map(|deviation| deviation.subject_id.as_str())
            .collect();
        let realized = RealizedMetrics {
            dropout_rate: ratio(output.dropouts.len(), n_subjects),
            missing_rate: dataset.missing_rate(),
            deviation_subject_rate: ratio(deviating.len(), n_subjects),
            deviation_count: deviations.len(),
            ae_vitals_correlation: point_biserial(&output.ae_pairs),
        };
        let realism = score_realism(
            realized,
            RealismTargets {
                dropout_rate: config.dropout_rate,
                missing_rate: config.missing_rate,
                deviation_rate: config.deviation_rate,
            },
        );
        info!(
            subjects = n_subjects,
            rows = dataset.len(),
            dropouts = output.dropouts.len(),
            deviations = deviations.len(),
            adverse_events = output.adverse_events.len(),
            realism = realism.overall,
            "scenario complete"
        );

        let mut metadata = DatasetMetadata::generated(GenerationMethod::Realistic, seed);
        if let Some(reason) = fallback {
            metadata = metadata.flagged(DataFlag::Degraded, reason);
        }
        metadata.scenario = Some(ScenarioArtifacts {
            enrollment,
            site_sizes: allocation.sizes,
            dropouts: output.dropouts,
            deviations,
            adverse_events: output.adverse_events,
            realism,
        });
        Ok(dataset.with_metadata(metadata))
    }
}

/// Stages 4, 5 and 7 for one chunk, in that order, each on the chunk's own
/// stream. Adverse events read the simulated vitals, not the masked rows.
fn simulate_chunk(inputs: &ChunkInputs<'_>, index: u64, chunk: &[PlannedSubject]) -> ChunkOutput {
    let mut trajectory_rng = substream_rng(inputs.seed, Stream::Trajectory, index);
    let mut missing_rng = substream_rng(inputs.seed, Stream::Missingness, index);
    let mut event_rng = substream_rng(inputs.seed, Stream::AdverseEvents, index);
    let columns = &inputs.context.model.columns;

    let mut output = ChunkOutput::default();
    let mut rows = Vec::new();
    let mut trajectories = Vec::with_capacity(chunk.len());
    for subject in chunk {
        let trajectory = simulate_subject(
            &inputs.context,
            subject.site,
            subject.treated,
            &mut trajectory_rng,
        );
        let arm = arm_label(inputs.config, subject.treated);
        let site = site_label(subject.site);
        for (visit, values) in inputs.visits.iter().zip(&trajectory.values) {
            let mut row = Row::new(&subject.subject_id, &site, arm, visit);
            for (name, value) in columns.iter().zip(values) {
                row = row.with_num(name, *value);
            }
            for (name, level) in &trajectory.categorical {
                row = row.with_cat(name, level);
            }
            rows.push(row);
        }
        if let Some(dropout) = trajectory.dropout_at {
            output.dropouts.push(DropoutRecord {
                subject_id: subject.subject_id.clone(),
                last_visit: inputs.visits[dropout - 1].clone(),
                dropout_visit: inputs.visits[dropout].clone(),
            });
        }
        output.attended.push((
            subject.subject_id.clone(),
            inputs.visits[..trajectory.values.len()].to_vec(),
        ));
        trajectories.push((subject, trajectory));
    }

    output.rows = inject_missing(
        rows,
        inputs.schema,
        inputs.visit_index,
        inputs.config.missing_rate,
        &mut missing_rng,
    );

    for (subject, trajectory) in &trajectories {
        let arm = arm_label(inputs.config, subject.treated);
        for (visit, values) in inputs.visits.iter().zip(&trajectory.values) {
            let observation = VisitObservation {
                subject_id: &subject.subject_id,
                arm,
                visit,
                treated: subject.treated,
                values,
            };
            let (abnormality, event) =
                simulate_visit(&observation, columns, inputs.schema, &mut event_rng);
            output.ae_pairs.push((abnormality.score, event.is_some()));
            output.adverse_events.extend(event);
        }
    }
    output
}

fn arm_label(config: &GenerationConfig, treated: bool) -> &str {
    if treated {
        &config.arms.treatment
    } else {
        &config.arms.control
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
