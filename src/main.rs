use anyhow::{Context, Result};
use clap::Parser;
use consortium_common::EcosystemConfig;
use consortium_engine::{output, MicrobialEcosystem, ScenarioRequest};
use env_logger::Builder;
use log::{debug, info, warn, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Runs the consortium dynamics engine for the configured scenario.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the number of species
    #[arg(long)]
    species: Option<usize>,

    /// Override the interaction structure seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the run duration in hours
    #[arg(long)]
    duration: Option<f64>,

    /// Override the temperature in °C
    #[arg(long)]
    temperature: Option<f64>,

    /// Override the intervention level (0.0 to 1.0)
    #[arg(long)]
    intervention: Option<f64>,

    /// Run the configured temperature x intervention grid in parallel
    #[arg(long, default_value_t = false)]
    sweep: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Info by default, RUST_LOG still wins
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Starting Consortium Dynamics Engine...");

    // --- Load Configuration ---
    let mut config = EcosystemConfig::load(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    debug!("Configuration: {:#?}", config);

    // --- Initialize Ecosystem ---
    let ecosystem = MicrobialEcosystem::from_config(&config)?;
    info!(
        "Ecosystem initialised with {} species (structure seed {}).",
        ecosystem.species_count(),
        config.ecosystem.structure_seed
    );

    let initial_population = draw_initial_population(&config, ecosystem.species_count())?;
    info!("Initial total biomass: {:.2}", initial_population.iter().sum::<f64>());

    if args.sweep {
        run_sweep(&ecosystem, &config, &initial_population)?;
    } else {
        run_single(&ecosystem, &config, &initial_population)?;
    }

    info!("Simulation Complete.");
    Ok(())
}

fn apply_overrides(config: &mut EcosystemConfig, args: &Args) {
    if let Some(n) = args.species {
        config.ecosystem.species_count = n;
    }
    if let Some(seed) = args.seed {
        config.ecosystem.structure_seed = seed;
    }
    if let Some(d) = args.duration {
        config.scenario.duration_hours = d;
    }
    if let Some(t) = args.temperature {
        config.scenario.temperature_c = t;
    }
    if let Some(i) = args.intervention {
        config.scenario.intervention_level = i;
    }
}

fn draw_initial_population(config: &EcosystemConfig, species_count: usize) -> Result<Vec<f64>> {
    let ic = &config.initial_conditions;
    let mut rng = StdRng::seed_from_u64(ic.seed);
    let dist = Uniform::new(ic.population_min, ic.population_max)
        .map_err(|e| anyhow::anyhow!("Invalid initial population range: {}", e))?;
    Ok((0..species_count).map(|_| dist.sample(&mut rng)).collect())
}

fn run_single(ecosystem: &MicrobialEcosystem, config: &EcosystemConfig, initial_population: &[f64]) -> Result<()> {
    let scenario = &config.scenario;
    info!(
        "Running {:.1}-hour simulation at {:.1} °C, intervention {:.2}...",
        scenario.duration_hours, scenario.temperature_c, scenario.intervention_level
    );

    let start_time = Instant::now();
    let run = ecosystem
        .simulate(
            initial_population,
            scenario.duration_hours,
            scenario.temperature_c,
            scenario.intervention_level,
        )
        .context("Simulation failed")?;
    info!(
        "Integration finished in {:.3} ms ({} steps, {} rejected, {} rate evaluations).",
        start_time.elapsed().as_secs_f64() * 1000.0,
        run.stats.accepted_steps,
        run.stats.rejected_steps,
        run.stats.rate_evaluations
    );

    let summary = run.summary();
    info!("Final total biomass: {:.2}", summary.final_biomass().unwrap_or(0.0));
    info!("Shannon diversity: {:.3}", summary.diversity);
    match summary.biomass_increase() {
        Some(increase) => info!("Biomass increase: {:.1}%", increase * 100.0),
        None => warn!("Biomass increase is undefined for zero initial biomass."),
    }

    // --- Save Recorded Data ---
    let base = Path::new(&config.output.base_filename);
    if config.output.save_summary {
        output::save_summary(&summary, base, config.output.format.as_deref())?;
    } else {
        info!("Skipping saving summary as per config (save_summary is false).");
    }

    if config.output.save_trajectory {
        output::save_trajectory_csv(&run, base)?;
    }
    Ok(())
}

fn run_sweep(ecosystem: &MicrobialEcosystem, config: &EcosystemConfig, initial_population: &[f64]) -> Result<()> {
    let sweep = &config.sweep;
    if sweep.temperatures_c.is_empty() || sweep.intervention_levels.is_empty() {
        anyhow::bail!("--sweep needs [sweep] temperatures_c and intervention_levels in the config.");
    }

    let requests = ScenarioRequest::grid(
        initial_population,
        config.scenario.duration_hours,
        &sweep.temperatures_c,
        &sweep.intervention_levels,
    );

    info!(
        "Sweeping {} scenarios on {} Rayon threads...",
        requests.len(),
        rayon::current_num_threads()
    );
    let start_time = Instant::now();
    let results = ecosystem.simulate_batch(&requests);
    info!("Sweep finished in {:.3} s.", start_time.elapsed().as_secs_f64());

    let records = output::sweep_records(&requests, results);

    if config.output.save_summary {
        output::save_sweep_csv(&records, Path::new(&config.output.base_filename))?;
    }
    Ok(())
}
