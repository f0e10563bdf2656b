use std::path::Path;

use claimprint_core::{
    CalibrationRecord, Error, InputDocument, OutputPaths, Result, calibrate, load_input,
    render_calibration, run::observed_vectors, write_all,
};

pub fn execute(
    input: &Path,
    out_dir: &Path,
    seed: Option<u64>,
    config_path: Option<&Path>,
) -> Result<CalibrationRecord> {
    let bundle = match load_input(input)? {
        InputDocument::Bundle(bundle) => bundle,
        InputDocument::Single(_) => {
            return Err(Error::InvalidInput(format!(
                "{} is a single partition report; calibration needs a report bundle",
                input.display()
            )));
        }
    };
    let config = super::resolve_config(config_path, seed)?;
    let record = calibrate(&observed_vectors(&bundle), &config);
    write_all(&render_calibration(&record, &OutputPaths::in_dir(out_dir))?)?;
    Ok(record)
}

pub fn run(input: &Path, out_dir: &Path, seed: Option<u64>, config_path: Option<&Path>) -> Result<()> {
    let record = execute(input, out_dir, seed, config_path)?;
    super::print_calibration_summary(&record);
    Ok(())
}
