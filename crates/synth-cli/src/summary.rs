//! Terminal tables for generation, comparison and benchmark results.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use synth_model::{
    DataFlag, Dataset, GenerationMethod, MethodComparison, PrivacyReport, QualityReport,
    Recommendations, RiskLevel, Validity,
};

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}

fn score_cell(value: f64) -> Cell {
    let color = if value >= 0.8 {
        Color::Green
    } else if value >= 0.5 {
        Color::Yellow
    } else {
        Color::Red
    };
    Cell::new(format!("{value:.3}")).fg(color)
}

fn optional_cell(value: Option<f64>) -> Cell {
    value.map_or_else(|| dim_cell("-"), |value| Cell::new(format!("{value:.3}")))
}

fn risk_cell(level: RiskLevel) -> Cell {
    let color = match level {
        RiskLevel::Low => Color::Green,
        RiskLevel::Medium => Color::Yellow,
        RiskLevel::High => Color::Red,
        RiskLevel::Indeterminate => Color::DarkGrey,
    };
    Cell::new(level.as_str()).fg(color).add_attribute(Attribute::Bold)
}

fn validity_cell(validity: &Validity) -> Cell {
    if validity.is_trusted() {
        Cell::new("trusted").fg(Color::Green)
    } else {
        Cell::new("degraded").fg(Color::Yellow)
    }
}

/// Rows, subjects, visits and trust flags of a generated dataset.
pub fn dataset_table(dataset: &Dataset) -> Table {
    let metadata = dataset.metadata();
    let mut table = Table::new();
    table.set_header(vec![header_cell("Property"), header_cell("Value")]);
    apply_table_style(&mut table);
    let method = metadata
        .method
        .map_or_else(|| "-".to_string(), |method| method.to_string());
    let flags: Vec<&str> = metadata
        .flags
        .iter()
        .map(|flag| match flag {
            DataFlag::Degraded => "degraded",
            DataFlag::Unconverged => "unconverged",
        })
        .collect();
    table.add_row(vec![Cell::new("Method"), Cell::new(method)]);
    table.add_row(vec![
        Cell::new("Seed"),
        Cell::new(metadata.seed.map_or_else(|| "-".to_string(), |seed| seed.to_string())),
    ]);
    table.add_row(vec![Cell::new("Rows"), Cell::new(dataset.len())]);
    table.add_row(vec![Cell::new("Subjects"), Cell::new(dataset.subjects().len())]);
    table.add_row(vec![Cell::new("Visits"), Cell::new(dataset.visits().join(", "))]);
    table.add_row(vec![
        Cell::new("Missing"),
        Cell::new(format!("{:.1}%", dataset.missing_rate() * 100.0)),
    ]);
    table.add_row(vec![
        Cell::new("Flags"),
        if flags.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(flags.join(", ")).fg(Color::Yellow)
        },
    ]);
    if let Some(realism) = metadata.scenario.as_ref().map(|scenario| scenario.realism) {
        table.add_row(vec![
            Cell::new("Realism"),
            Cell::new(format!("{:.1} / 100", realism.overall)),
        ]);
        table.add_row(vec![
            Cell::new("Realised dropout"),
            Cell::new(format!("{:.1}%", realism.realized.dropout_rate * 100.0)),
        ]);
    }
    if let Some(imputation) = &metadata.imputation {
        let iterations: Vec<String> = imputation
            .iterations
            .iter()
            .map(ToString::to_string)
            .collect();
        table.add_row(vec![
            Cell::new("Imputation"),
            Cell::new(format!(
                "{} passes ({} sweeps), {} cells, converged: {}",
                imputation.passes,
                iterations.join("/"),
                imputation.imputed_cells,
                imputation.converged
            )),
        ]);
    }
    table
}

/// Per-variable fidelity followed by the aggregate scores.
pub fn quality_table(report: &QualityReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Type"),
        header_cell("Similarity"),
        header_cell("Wasserstein"),
        header_cell("KS"),
        header_cell("p-value"),
        header_cell("Ref mean"),
        header_cell("Syn mean"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 2..8 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for metrics in &report.variables {
        table.add_row(vec![
            Cell::new(&metrics.name),
            Cell::new(if metrics.continuous { "continuous" } else { "categorical" }),
            score_cell(metrics.similarity),
            optional_cell(metrics.wasserstein),
            optional_cell(metrics.ks_statistic),
            optional_cell(metrics.p_value),
            optional_cell(metrics.reference_mean),
            optional_cell(metrics.candidate_mean),
        ]);
    }
    let totals = [
        ("Distribution", report.distribution_score),
        ("Correlation", report.correlation_score),
        ("Utility", report.utility_score),
        ("Composite", report.composite),
    ];
    for (label, value) in totals {
        table.add_row(vec![
            Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold),
            dim_cell("score"),
            score_cell(value).add_attribute(Attribute::Bold),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
        ]);
    }
    table
}

pub fn privacy_table(report: &PrivacyReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Measure"), header_cell("Value")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![
        Cell::new("Quasi-identifiers"),
        Cell::new(report.quasi_identifiers.join(", ")),
    ]);
    table.add_row(vec![Cell::new("k-anonymity"), Cell::new(report.k_anonymity)]);
    table.add_row(vec![Cell::new("l-diversity"), Cell::new(report.l_diversity)]);
    table.add_row(vec![
        Cell::new("Flagged records"),
        Cell::new(report.flagged_records.len()),
    ]);
    table.add_row(vec![
        Cell::new("Singling out"),
        optional_cell(report.attacks.singling_out),
    ]);
    table.add_row(vec![Cell::new("Linkability"), optional_cell(report.attacks.linkability)]);
    table.add_row(vec![
        Cell::new("Attribute inference"),
        optional_cell(report.attacks.attribute_inference),
    ]);
    table.add_row(vec![Cell::new("Overall risk"), optional_cell(report.overall_risk)]);
    table.add_row(vec![Cell::new("Risk level"), risk_cell(report.risk_level)]);
    table.add_row(vec![
        Cell::new("Safe for release"),
        if report.safe_for_release {
            Cell::new("yes").fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            Cell::new("no").fg(Color::Red).add_attribute(Attribute::Bold)
        },
    ]);
    table.add_row(vec![Cell::new("Validity"), validity_cell(&report.validity)]);
    table
}

/// One row per method in rank order.
pub fn ranking_table(comparison: &MethodComparison) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Rank"),
        header_cell("Method"),
        header_cell("Composite"),
        header_cell("Distribution"),
        header_cell("Correlation"),
        header_cell("Utility"),
        header_cell("Privacy"),
        header_cell("Speed"),
        header_cell("Risk"),
        header_cell("ms"),
    ]);
    apply_summary_table_style(&mut table);
    for index in [0, 2, 3, 4, 5, 6, 7, 9] {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for ranked in &comparison.ranking {
        let Some(result) = comparison.results.get(&ranked.name) else {
            continue;
        };
        let scores = &ranked.normalized;
        table.add_row(vec![
            Cell::new(ranked.rank).add_attribute(Attribute::Bold),
            Cell::new(&ranked.name),
            score_cell(ranked.composite).add_attribute(Attribute::Bold),
            score_cell(scores.distribution),
            score_cell(scores.correlation),
            score_cell(scores.utility),
            score_cell(scores.privacy),
            score_cell(scores.performance),
            risk_cell(result.privacy.risk_level),
            Cell::new(format!("{:.0}", result.performance.elapsed_ms)),
        ]);
    }
    table
}

pub fn methods_table() -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Method"),
        header_cell("Reference"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    for method in GenerationMethod::ALL {
        table.add_row(vec![
            Cell::new(method.as_str()),
            if method.requires_reference() {
                Cell::new("required").fg(Color::Yellow)
            } else {
                dim_cell("optional")
            },
            Cell::new(method_description(method)),
        ]);
    }
    table
}

pub fn method_description(method: GenerationMethod) -> &'static str {
    match method {
        GenerationMethod::Distribution => {
            "Multivariate normal per arm and visit, fitted from the reference or priors"
        }
        GenerationMethod::Resampling => {
            "Stratified bootstrap of reference rows with Gaussian jitter"
        }
        GenerationMethod::Graphical => {
            "Bayesian network over discretised variables, sampled by CPT"
        }
        GenerationMethod::Imputation => {
            "Masked template rows completed by chained-equation imputation"
        }
        GenerationMethod::Realistic => {
            "Trial simulation: enrollment, sites, dropout, deviations, adverse events"
        }
    }
}

/// One line per recommendation category that has a winner.
pub fn recommendation_lines(recommendations: &Recommendations) -> Vec<String> {
    [
        ("Balanced", &recommendations.balanced),
        ("Highest fidelity", &recommendations.highest_fidelity),
        ("Most private", &recommendations.most_private),
        ("Fastest", &recommendations.fastest),
    ]
    .into_iter()
    .filter_map(|(label, method)| method.as_ref().map(|method| format!("{label}: {method}")))
    .collect()
}

/// Degradation reasons of a validity value, prefixed by where they came from.
pub fn validity_lines(source: &str, validity: &Validity) -> Vec<String> {
    validity
        .reasons()
        .iter()
        .map(|reason| format!("{source}: {reason}"))
        .collect()
}
