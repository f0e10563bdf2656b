use std::path::Path;

use claimprint_core::{
    OutputPaths, Result, RunOutput, ThresholdSource, load_calibration_from_path, load_input,
    publish, render_run, superseded_documents,
};

pub struct ScoreCommandConfig<'a> {
    pub input: &'a Path,
    pub out_dir: &'a Path,
    pub seed: Option<u64>,
    pub config_path: Option<&'a Path>,
    pub calibration_path: Option<&'a Path>,
    pub print_json: bool,
}

/// Load, score, and write every document, or nothing on failure.
pub fn execute(cfg: &ScoreCommandConfig<'_>) -> Result<RunOutput> {
    let input = load_input(cfg.input)?;
    let source = match cfg.calibration_path {
        Some(path) => ThresholdSource::Reuse(load_calibration_from_path(path)?),
        None => ThresholdSource::Calibrate(super::resolve_config(cfg.config_path, cfg.seed)?),
    };
    let paths = OutputPaths::in_dir(cfg.out_dir);
    let output = claimprint_core::run(&input, source, &paths)?;
    let artifacts = render_run(&output, &paths)?;
    publish(&artifacts, &superseded_documents(&output, &paths))?;
    Ok(output)
}

pub fn run(cfg: ScoreCommandConfig<'_>) -> Result<()> {
    let output = execute(&cfg)?;

    if let Some(calibration) = &output.calibration {
        super::print_calibration_summary(calibration);
        println!();
    }
    match &output.by_state {
        Some(doc) => {
            println!("Scores ({} partitions, default {}):", doc.scores.len(), doc.default_state);
            for id in &doc.available_states {
                if let Some(score) = doc.scores.get(id) {
                    println!("{}", super::format_score_line(id, score));
                }
            }
        }
        None => println!("{}", super::format_score_line("report", &output.score)),
    }

    if cfg.print_json {
        println!("{}", serde_json::to_string_pretty(&output.score)?);
    }
    Ok(())
}
