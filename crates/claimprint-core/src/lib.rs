//! # claimprint-core
//!
//! **Does this claims dataset look organically billed, or generated?**
//!
//! `claimprint-core` scores aggregated per-partition claims reports for the
//! statistical fingerprints of synthetic generation or tampering: clustered
//! unit prices, non-uniform trailing cents, weak volume/payment correlations,
//! over-smooth monthly series, low cents entropy and grid heaping.
//!
//! ## Quick Start
//!
//! ```no_run
//! use claimprint_core::{OutputPaths, ThresholdSource, CalibrationConfig, load_input, run};
//!
//! let input = load_input("outputs/json/report_by_state.json".as_ref()).unwrap();
//! let paths = OutputPaths::default();
//! let out = run(&input, ThresholdSource::Calibrate(CalibrationConfig::default()), &paths).unwrap();
//! println!("ALL: {} ({} of 5 families failed)", out.score.verdict, out.score.fail_count);
//! ```
//!
//! ## Architecture
//!
//! Report → Feature Vector → Null Model → Thresholds → Signals → Verdict
//!
//! - [`features`] reduces a [`PartitionReport`] to 13 bounded features,
//!   resolving each through an ordered list of candidate lookups.
//! - [`null_model`] bootstraps a realistic population from the observed
//!   regional vectors and a tampered counterpart of it.
//! - [`thresholds`] takes upper/lower quantiles of the realistic population.
//! - [`signals`] applies the cutoffs: six raw signals, five families.
//! - [`verdict`] flags a partition when 3 or more families fail.
//! - [`calibration`] benchmarks both populations so the cutoffs can be audited.
//!
//! Calibration is seeded; identical inputs and seed give identical documents.

pub mod calibration;
pub mod config;
pub mod error;
pub mod features;
pub mod null_model;
pub mod output;
pub mod report;
pub mod run;
pub mod signals;
pub mod thresholds;
pub mod verdict;

pub use calibration::{
    Benchmark, CalibrationRecord, DistSummary, METHOD as CALIBRATION_METHOD, PopulationBenchmark,
    calibrate, load_calibration_from_path,
};
pub use config::{CalibrationConfig, DEFAULT_SEED, OutputPaths, load_config_from_path};
pub use error::{Error, Result};
pub use features::{Extraction, FEATURE_COUNT, Feature, FeatureVector, extract};
pub use null_model::{NullModel, synthesize};
pub use output::{
    Artifact, publish, render_calibration, render_run, superseded_documents, write_all,
};
pub use report::{ALL_PARTITION, InputDocument, PartitionReport, ReportBundle, load_input};
pub use run::{AllPartitionsDocument, RunOutput, ScoreBook, ThresholdSource, run, run_bundle, run_single};
pub use signals::{Evaluation, FamilyFailures, SignalFamily, SignalFlags, evaluate};
pub use thresholds::{ThresholdSet, derive_thresholds};
pub use verdict::{FAMILY_FAIL_RULE, MetricValue, ScoreResult, SignalReport, Verdict, score};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
