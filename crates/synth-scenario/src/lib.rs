//! Realistic clinical-trial scenario simulation.
//!
//! The generator runs a fixed chain of stages, each a plain function over
//! explicit inputs and its own seeded stream:
//!
//! 1. [`enrollment`] dates under a front-loaded, seasonal or uniform pattern
//! 2. [`sites`] allocation from a Dirichlet draw
//! 3. per-site additive effects
//! 4. [`trajectory`] walks with calibrated dropout hazards
//! 5. [`missing`] MAR masking
//! 6. protocol [`deviations`]
//! 7. [`adverse_events`] tied to abnormal vitals
//! 8. [`realism`] scoring
//!
//! Stages 4, 5 and 7 run per chunk of subjects in parallel; the rest run once.

pub mod adverse_events;
pub mod baseline;
pub mod deviations;
pub mod enrollment;
pub mod missing;
pub mod pipeline;
pub mod realism;
pub mod sites;
pub mod trajectory;

pub use baseline::{BaselineFit, BaselineModel};
pub use pipeline::ScenarioGenerator;
pub use realism::{RealismTargets, score_realism};
