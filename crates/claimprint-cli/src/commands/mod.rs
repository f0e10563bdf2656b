pub mod calibrate;
pub mod score;

use std::path::Path;

use claimprint_core::{CalibrationConfig, CalibrationRecord, ScoreResult, load_config_from_path};

/// Config file (or defaults) with the `--seed` override applied.
pub fn resolve_config(
    config_path: Option<&Path>,
    seed: Option<u64>,
) -> claimprint_core::Result<CalibrationConfig> {
    let mut config = match config_path {
        Some(path) => load_config_from_path(path)?,
        None => CalibrationConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

/// One line per partition: id, verdict, family and raw fail counts.
pub fn format_score_line(id: &str, score: &ScoreResult) -> String {
    format!(
        "  {:<6} {:<28} families {}/{}  raw {}",
        id, score.verdict.as_str(), score.fail_count, score.family_total, score.raw_fail_count
    )
}

pub fn print_calibration_summary(record: &CalibrationRecord) {
    println!(
        "Calibration: {} observed, {} realistic, {} synthetic (seed {}){}",
        record.observed_samples,
        record.realistic_samples,
        record.synthetic_samples,
        record.seed,
        if record.fallback { " (fallback thresholds)" } else { "" }
    );
    let b = &record.benchmark;
    println!(
        "  mean family fails: realistic {:.2}, synthetic {:.2}  (flag rate {:.1}% vs {:.1}%)",
        b.realistic.family_fail_count.mean,
        b.synthetic.family_fail_count.mean,
        b.realistic.flag_rate * 100.0,
        b.synthetic.flag_rate * 100.0
    );
}
