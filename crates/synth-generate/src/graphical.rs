//! Discrete Bayesian-network generator.
//!
//! Continuous variables are binned on clinical cut points, a DAG is supplied
//! or learned with a BIC-scored K2 search, conditional probability tables are
//! fitted with Dirichlet smoothing, and rows are drawn by forward sampling.

use std::collections::BTreeMap;

use synth_common::rng::{choose_weighted, uniform};
use synth_common::{Stream, SynthRng, stream_rng, subject_label};
use synth_model::{
    ARM_FIELD, DataFlag, Dataset, DatasetMetadata, DependencyGraph, GenerationConfig,
    GenerationMethod, GraphSettings, Result, Row, SynthError, VISIT_FIELD, Value, VariableKind,
};
use tracing::{debug, info, warn};

use crate::cache::StatisticsCache;
use crate::common::{ArmPlan, SitePool, arm_plans};
use crate::stats::{ReferenceStatistics, bin_index};

/// Below this many complete reference rows no dependencies are learned.
pub const MIN_COMPLETE_ROWS: usize = 10;

const ARM_NODE: usize = 0;
const VISIT_NODE: usize = 1;

#[derive(Debug, Clone)]
enum NodeKind {
    Arm,
    Visit,
    Continuous {
        edges: Vec<f64>,
        /// Observed `(min, max)` per bin, falling back to the bin edges.
        ranges: Vec<(f64, f64)>,
    },
    Categorical {
        levels: Vec<String>,
    },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    states: usize,
    kind: NodeKind,
}

/// Fitted network: structure, CPTs and sampling order.
#[derive(Debug, Clone)]
pub struct GraphicalModel {
    nodes: Vec<Node>,
    parents: Vec<Vec<usize>>,
    /// `cpts[node][parent configuration][state]`.
    cpts: Vec<Vec<Vec<f64>>>,
    order: Vec<usize>,
    graph: DependencyGraph,
    degraded: Option<String>,
}

impl GraphicalModel {
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name.as_str()).collect()
    }

    /// Conditional distribution of `node` for one parent configuration.
    pub fn conditional(&self, node: &str, configuration: usize) -> Option<&[f64]> {
        let index = self.nodes.iter().position(|n| n.name == node)?;
        self.cpts[index].get(configuration).map(Vec::as_slice)
    }

    fn configuration(&self, node: usize, states: &[usize]) -> usize {
        configuration_index(&self.parents[node], &self.nodes, |parent| Some(states[parent]))
            .unwrap_or(0)
    }

    /// One full state vector with ARM and VISIT clamped.
    fn sample_states(&self, arm: usize, visit: usize, rng: &mut SynthRng) -> Vec<usize> {
        let mut states = vec![0; self.nodes.len()];
        states[ARM_NODE] = arm;
        states[VISIT_NODE] = visit;
        for &node in &self.order {
            if node == ARM_NODE || node == VISIT_NODE {
                continue;
            }
            let configuration = self.configuration(node, &states);
            states[node] = choose_weighted(rng, &self.cpts[node][configuration]);
        }
        states
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphicalGenerator;

impl GraphicalGenerator {
    pub fn fit(&self, reference: &Dataset, config: &GenerationConfig) -> Result<GraphicalModel> {
        if reference.is_empty() {
            return Err(SynthError::invalid_config(
                "graphical generation requires a non-empty reference dataset",
            ));
        }
        let stats = StatisticsCache::global().get_or_compute(reference)?;
        let visits = config.visit_schedule(Some(reference));
        let arms = arm_plans(config, Some(reference));
        let nodes = build_nodes(reference, &stats, &visits);
        let records = encode_records(reference, &nodes, &arms, &visits);
        let complete = records
            .iter()
            .filter(|record| record.iter().all(Option::is_some))
            .count();

        let explicit = config
            .graph
            .structure
            .as_ref()
            .map(|structure| explicit_parents(structure, &nodes))
            .transpose()?;

        let (parents, degraded) = if complete < MIN_COMPLETE_ROWS {
            let reason = format!(
                "{complete} complete reference rows (< {MIN_COMPLETE_ROWS}); variables sampled independently"
            );
            (vec![Vec::new(); nodes.len()], Some(reason))
        } else if let Some(parents) = explicit {
            (parents, None)
        } else {
            (learn_structure(&nodes, &records, config.graph.max_parents), None)
        };

        let mut graph = DependencyGraph::new(nodes.iter().map(|node| node.name.clone()));
        for (child, parent_list) in parents.iter().enumerate() {
            for &parent in parent_list {
                graph.add_edge(nodes[parent].name.clone(), nodes[child].name.clone());
            }
        }
        let order: Vec<usize> = graph
            .topological_order()?
            .iter()
            .filter_map(|name| nodes.iter().position(|node| &node.name == name))
            .collect();
        let cpts = fit_cpts(&nodes, &parents, &records, &config.graph);
        debug!(
            nodes = nodes.len(),
            edges = graph.edges.len(),
            complete_rows = complete,
            "graphical model fitted"
        );
        Ok(GraphicalModel {
            nodes,
            parents,
            cpts,
            order,
            graph,
            degraded,
        })
    }

    pub fn generate(&self, reference: &Dataset, config: &GenerationConfig) -> Result<Dataset> {
        let model = self.fit(reference, config)?;
        let schema = reference.schema();
        let visits = config.visit_schedule(Some(reference));
        let sites = SitePool::new(Some(reference), config.n_sites);
        let mut rng = stream_rng(config.seed, Stream::Graphical);

        let mut rows = Vec::with_capacity(2 * config.n_per_arm * visits.len());
        for (arm_index, arm) in arm_plans(config, Some(reference)).iter().enumerate() {
            for i in 0..config.n_per_arm {
                let subject = subject_label(arm.first_ordinal + i);
                let site = sites.draw(arm.first_ordinal + i, &mut rng);
                for (visit_index, visit) in visits.iter().enumerate() {
                    let states = model.sample_states(arm_index, visit_index, &mut rng);
                    let mut row = Row::new(&subject, &site, &arm.label, visit);
                    for (node, state) in model.nodes.iter().zip(&states).skip(2) {
                        match &node.kind {
                            NodeKind::Continuous { ranges, .. } => {
                                let (low, high) = ranges[*state];
                                let value = low + uniform(&mut rng) * (high - low);
                                let value = schema
                                    .variable(&node.name)
                                    .map_or(value, |variable| variable.clip_and_round(value));
                                row = row.with_num(&node.name, value);
                            }
                            NodeKind::Categorical { levels } => {
                                row = row.with_cat(&node.name, &levels[*state]);
                            }
                            NodeKind::Arm | NodeKind::Visit => {}
                        }
                    }
                    rows.push(row);
                }
            }
        }

        let mut metadata = DatasetMetadata::generated(GenerationMethod::Graphical, config.seed);
        if let Some(reason) = &model.degraded {
            warn!(reason = %reason, "graphical generator degraded");
            metadata = metadata.flagged(DataFlag::Degraded, reason.clone());
        }
        info!(edges = model.graph.edges.len(), "dependency graph attached");
        metadata.graph = Some(model.graph);
        Ok(reference.with_rows(rows)?.with_metadata(metadata))
    }
}

fn build_nodes(reference: &Dataset, stats: &ReferenceStatistics, visits: &[String]) -> Vec<Node> {
    let mut nodes = vec![
        Node {
            name: ARM_FIELD.to_string(),
            states: 2,
            kind: NodeKind::Arm,
        },
        Node {
            name: VISIT_FIELD.to_string(),
            states: visits.len(),
            kind: NodeKind::Visit,
        },
    ];
    for variable in &reference.schema().variables {
        let kind = match &variable.kind {
            VariableKind::Continuous { .. } => {
                let edges = stats
                    .summary(&variable.name)
                    .map(|summary| summary.edges.clone())
                    .unwrap_or_default();
                let bins = edges.len().saturating_sub(1).max(1);
                let mut ranges: Vec<Option<(f64, f64)>> = vec![None; bins];
                for value in reference.numeric_column(&variable.name) {
                    let slot = &mut ranges[bin_index(&edges, value).min(bins - 1)];
                    *slot = Some(match *slot {
                        Some((low, high)) => (low.min(value), high.max(value)),
                        None => (value, value),
                    });
                }
                let ranges = ranges
                    .into_iter()
                    .enumerate()
                    .map(|(bin, observed)| {
                        observed.unwrap_or_else(|| {
                            (
                                edges.get(bin).copied().unwrap_or_default(),
                                edges.get(bin + 1).copied().unwrap_or_default(),
                            )
                        })
                    })
                    .collect();
                NodeKind::Continuous { edges, ranges }
            }
            VariableKind::Categorical { levels } => NodeKind::Categorical {
                levels: levels.clone(),
            },
        };
        let states = match &kind {
            NodeKind::Continuous { ranges, .. } => ranges.len(),
            NodeKind::Categorical { levels } => levels.len(),
            NodeKind::Arm | NodeKind::Visit => 1,
        };
        nodes.push(Node {
            name: variable.name.clone(),
            states,
            kind,
        });
    }
    nodes
}

/// State index per node for every reference row; `None` when unobserved or
/// outside the modelled arms and visits.
fn encode_records(
    reference: &Dataset,
    nodes: &[Node],
    arms: &[ArmPlan; 2],
    visits: &[String],
) -> Vec<Vec<Option<usize>>> {
    reference
        .rows()
        .iter()
        .map(|row| {
            nodes
                .iter()
                .map(|node| match &node.kind {
                    NodeKind::Arm => arms
                        .iter()
                        .position(|arm| arm.source.as_deref() == Some(row.arm.as_str())),
                    NodeKind::Visit => visits.iter().position(|visit| *visit == row.visit),
                    NodeKind::Continuous { edges, .. } => row
                        .num(&node.name)
                        .map(|value| bin_index(edges, value).min(node.states - 1)),
                    NodeKind::Categorical { levels } => row
                        .value(&node.name)
                        .and_then(Value::as_str)
                        .and_then(|level| levels.iter().position(|l| l == level)),
                })
                .collect()
        })
        .collect()
}

/// Mixed-radix index of the parents' states; `None` if any parent is unobserved.
fn configuration_index(
    parents: &[usize],
    nodes: &[Node],
    state_of: impl Fn(usize) -> Option<usize>,
) -> Option<usize> {
    let mut index = 0;
    for &parent in parents {
        index = index * nodes[parent].states + state_of(parent)?;
    }
    Some(index)
}

fn configuration_count(parents: &[usize], nodes: &[Node]) -> usize {
    parents.iter().map(|parent| nodes[*parent].states).product()
}

/// BIC-penalised log-likelihood of `child` given `parents`.
fn family_score(
    child: usize,
    parents: &[usize],
    nodes: &[Node],
    records: &[Vec<Option<usize>>],
) -> f64 {
    let states = nodes[child].states;
    let configurations = configuration_count(parents, nodes);
    let mut counts = vec![vec![0usize; states]; configurations];
    let mut observed = 0usize;
    for record in records {
        let Some(state) = record[child] else { continue };
        let Some(configuration) = configuration_index(parents, nodes, |p| record[p]) else {
            continue;
        };
        counts[configuration][state] += 1;
        observed += 1;
    }
    if observed == 0 {
        return f64::NEG_INFINITY;
    }
    let mut log_likelihood = 0.0;
    for row in &counts {
        let total: usize = row.iter().sum();
        for &count in row.iter().filter(|count| **count > 0) {
            log_likelihood += count as f64 * (count as f64 / total as f64).ln();
        }
    }
    let free_parameters = ((states - 1) * configurations) as f64;
    log_likelihood - 0.5 * (observed as f64).ln() * free_parameters
}

/// Greedy K2 search over the node order; ARM and VISIT stay roots.
fn learn_structure(
    nodes: &[Node],
    records: &[Vec<Option<usize>>],
    max_parents: usize,
) -> Vec<Vec<usize>> {
    let mut parents = vec![Vec::new(); nodes.len()];
    for child in (VISIT_NODE + 1)..nodes.len() {
        let mut current = family_score(child, &parents[child], nodes, records);
        while parents[child].len() < max_parents {
            let mut best: Option<(usize, f64)> = None;
            for candidate in 0..child {
                if parents[child].contains(&candidate) {
                    continue;
                }
                let mut trial = parents[child].clone();
                trial.push(candidate);
                let score = family_score(child, &trial, nodes, records);
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((candidate, score));
                }
            }
            match best {
                Some((candidate, score)) if score > current + 1e-9 => {
                    parents[child].push(candidate);
                    current = score;
                }
                _ => break,
            }
        }
    }
    parents
}

fn explicit_parents(structure: &DependencyGraph, nodes: &[Node]) -> Result<Vec<Vec<usize>>> {
    let index: BTreeMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.name.as_str(), i))
        .collect();
    for name in &structure.nodes {
        if !index.contains_key(name.as_str()) {
            return Err(SynthError::invalid_config(format!(
                "dependency graph names unknown node {name}"
            )));
        }
    }
    structure.topological_order()?;
    let mut parents = vec![Vec::new(); nodes.len()];
    for edge in &structure.edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            return Err(SynthError::invalid_config(format!(
                "edge {} -> {} names an unknown node",
                edge.from, edge.to
            )));
        };
        if to == ARM_NODE || to == VISIT_NODE {
            return Err(SynthError::invalid_config(format!(
                "{} is a clamped root and cannot have parents",
                edge.to
            )));
        }
        parents[to].push(from);
    }
    Ok(parents)
}

fn fit_cpts(
    nodes: &[Node],
    parents: &[Vec<usize>],
    records: &[Vec<Option<usize>>],
    settings: &GraphSettings,
) -> Vec<Vec<Vec<f64>>> {
    nodes
        .iter()
        .enumerate()
        .map(|(node, spec)| {
            let configurations = configuration_count(&parents[node], nodes);
            let mut counts = vec![vec![0.0; spec.states]; configurations];
            for record in records {
                let Some(state) = record[node] else { continue };
                if let Some(configuration) =
                    configuration_index(&parents[node], nodes, |p| record[p])
                {
                    counts[configuration][state] += 1.0;
                }
            }
            counts
                .into_iter()
                .map(|row| {
                    let total: f64 = row.iter().sum::<f64>() + settings.alpha * spec.states as f64;
                    row.iter()
                        .map(|count| (count + settings.alpha) / total)
                        .collect()
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Schema, VariableSpec};

    /// Y tracks X closely; Z is noise.
    fn reference(rows: usize) -> Dataset {
        let schema = Schema::new(vec![
            VariableSpec::continuous("X", 0.0, 100.0, 0),
            VariableSpec::continuous("Y", 0.0, 100.0, 0),
            VariableSpec::categorical("Z", ["a", "b"]),
        ])
        .expect("schema");
        let rows = (0..rows)
            .map(|i| {
                let x = (i * 37 % 100) as f64;
                Row::new(format!("S{i}"), "01", if i % 2 == 0 { "A" } else { "B" }, "V1")
                    .with_num("X", x)
                    .with_num("Y", (x + (i % 3) as f64).min(100.0))
                    .with_cat("Z", if i % 7 < 3 { "a" } else { "b" })
            })
            .collect();
        Dataset::new(schema, rows).expect("dataset")
    }

    #[test]
    fn learns_the_strong_dependency() {
        let config = GenerationConfig::new(GenerationMethod::Graphical);
        let model = GraphicalGenerator
            .fit(&reference(200), &config)
            .expect("fit");
        assert!(model.graph().parents("Y").contains(&"X"));
        assert!(model.graph().parents(ARM_FIELD).is_empty());
    }

    #[test]
    fn cpt_rows_are_distributions() {
        let config = GenerationConfig::new(GenerationMethod::Graphical);
        let model = GraphicalGenerator
            .fit(&reference(200), &config)
            .expect("fit");
        let row = model.conditional("Z", 0).expect("Z has a CPT");
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(row.iter().all(|p| *p > 0.0));
    }

    #[test]
    fn tiny_reference_gives_edgeless_degraded_model() {
        let config = GenerationConfig::new(GenerationMethod::Graphical).with_n_per_arm(5);
        let dataset = GraphicalGenerator
            .generate(&reference(6), &config)
            .expect("generate");
        assert!(dataset.metadata().has_flag(DataFlag::Degraded));
        let graph = dataset.metadata().graph.as_ref().expect("graph attached");
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn explicit_cycle_is_rejected() {
        let structure = DependencyGraph::new(["X", "Y"])
            .with_edge("X", "Y")
            .with_edge("Y", "X");
        let config = GenerationConfig::new(GenerationMethod::Graphical).with_graph(GraphSettings {
            structure: Some(structure),
            ..GraphSettings::default()
        });
        let result = GraphicalGenerator.fit(&reference(50), &config);
        assert!(matches!(result, Err(SynthError::InvalidConfiguration(_))));
    }

    #[test]
    fn explicit_graph_is_checked_even_for_a_tiny_reference() {
        let cyclic = DependencyGraph::new(["X", "Y"])
            .with_edge("X", "Y")
            .with_edge("Y", "X");
        let unknown = DependencyGraph::new(["X", "HR"]).with_edge("X", "HR");
        for structure in [cyclic, unknown] {
            let settings = GraphSettings {
                structure: Some(structure),
                ..GraphSettings::default()
            };
            let config = GenerationConfig::new(GenerationMethod::Graphical).with_graph(settings);
            let result = GraphicalGenerator.fit(&reference(6), &config);
            assert!(matches!(result, Err(SynthError::InvalidConfiguration(_))));
        }
    }

    #[test]
    fn explicit_edge_into_arm_is_rejected() {
        let structure = DependencyGraph::new(["X", "ARM"]).with_edge("X", "ARM");
        let config = GenerationConfig::new(GenerationMethod::Graphical).with_graph(GraphSettings {
            structure: Some(structure),
            ..GraphSettings::default()
        });
        assert!(GraphicalGenerator.fit(&reference(50), &config).is_err());
    }
}
