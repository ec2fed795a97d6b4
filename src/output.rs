//! Writers for run summaries, trajectories and sweep tables.

use crate::ecosystem::{ScenarioRequest, SimulationRun};
use crate::error::Result as EngineResult;
use anyhow::{Context, Result};
use consortium_common::{RunSummary, SweepRecord};
use log::{error, info};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

// `base` + `suffix` appended to the file name ("out/run" + "_summary.json").
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Saves `summary` next to `base` in the requested format and returns the path written.
///
/// `None` means JSON. An unknown format is logged and falls back to JSON.
pub fn save_summary(summary: &RunSummary, base: &Path, format: Option<&str>) -> Result<PathBuf> {
    match format.unwrap_or("json") {
        "json" => write_json(summary, base),
        "bincode" => {
            // Binary format (much more compact)
            let path = with_suffix(base, "_summary.bin");
            let file = File::create(&path)
                .with_context(|| format!("Error creating summary file '{}'", path.display()))?;
            bincode::serialize_into(BufWriter::new(file), summary)
                .with_context(|| format!("Error serializing summary to bincode '{}'", path.display()))?;
            info!("Summary saved to {} (binary format)", path.display());
            Ok(path)
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let path = with_suffix(base, "_summary.msgpack");
            let file = File::create(&path)
                .with_context(|| format!("Error creating summary file '{}'", path.display()))?;
            let mut writer = BufWriter::new(file);
            rmp_serde::encode::write(&mut writer, summary)
                .with_context(|| format!("Error serializing summary to MessagePack '{}'", path.display()))?;
            writer.flush()?;
            info!("Summary saved to {} (MessagePack format)", path.display());
            Ok(path)
        }
        other => {
            error!("Unknown output format: {}. Using JSON instead.", other);
            write_json(summary, base)
        }
    }
}

fn write_json(summary: &RunSummary, base: &Path) -> Result<PathBuf> {
    let path = with_suffix(base, "_summary.json");
    let json_string = serde_json::to_string_pretty(summary).context("Error serializing summary to JSON")?;
    let mut file = File::create(&path)
        .with_context(|| format!("Error creating summary file '{}'", path.display()))?;
    file.write_all(json_string.as_bytes())
        .with_context(|| format!("Error writing summary JSON to file '{}'", path.display()))?;
    info!("Summary saved to {}", path.display());
    Ok(path)
}

/// Writes every accepted step of `run` as `time_h,total_biomass,species_0,...`.
pub fn save_trajectory_csv(run: &SimulationRun, base: &Path) -> Result<PathBuf> {
    let path = with_suffix(base, "_trajectory.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;

    let species = run.populations.nrows();
    let mut header = vec!["time_h".to_string(), "total_biomass".to_string()];
    header.extend((0..species).map(|i| format!("species_{}", i)));
    writer.write_record(&header)?;

    for (k, t) in run.time.iter().enumerate() {
        let mut record = vec![format!("{:.6}", t), format!("{:.6}", run.total_biomass[k])];
        record.extend(run.populations.column(k).iter().map(|y| format!("{:.6}", y)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!("Trajectory saved to {}", path.display());
    Ok(path)
}

/// Pairs each sweep request with its outcome. Failed runs keep their scenario
/// and carry the error message with NaN metrics.
pub fn sweep_records(requests: &[ScenarioRequest], results: Vec<EngineResult<SimulationRun>>) -> Vec<SweepRecord> {
    requests
        .iter()
        .zip(results)
        .map(|(req, result)| match result {
            Ok(run) => {
                let final_biomass = run.total_biomass.last().copied().unwrap_or(0.0);
                info!(
                    "T = {:5.1} °C | intervention {:.2} | final biomass {:10.2} | diversity {:.3}",
                    req.scenario.temperature_c, req.scenario.intervention_level, final_biomass, run.diversity
                );
                SweepRecord {
                    temperature_c: req.scenario.temperature_c,
                    intervention_level: req.scenario.intervention_level,
                    final_biomass,
                    diversity: run.diversity,
                    error: None,
                }
            }
            Err(e) => {
                error!(
                    "T = {:5.1} °C | intervention {:.2} | failed: {}",
                    req.scenario.temperature_c, req.scenario.intervention_level, e
                );
                SweepRecord {
                    temperature_c: req.scenario.temperature_c,
                    intervention_level: req.scenario.intervention_level,
                    final_biomass: f64::NAN,
                    diversity: f64::NAN,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect()
}

/// Writes one CSV row per sweep record.
pub fn save_sweep_csv(records: &[SweepRecord], base: &Path) -> Result<PathBuf> {
    let path = with_suffix(base, "_sweep.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("Sweep results saved to {}", path.display());
    Ok(path)
}
