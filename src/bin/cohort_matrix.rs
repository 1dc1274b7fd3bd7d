//! Export one trial's cohort cash-flow matrix
//!
//! Builds a single synthetic population and writes its year-by-cohort net
//! cash flows (premiums minus pensions) with a total column.
//! Accepts config via environment variables:
//!   POPULATION_SIZE, VALUATION_YEAR, SEED, ASSUMPTIONS_DIR, OUTPUT_CSV

use anyhow::{Context, Result};
use chrono::Datelike;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use pension_car::{
    report::write_matrix_csv, Assumptions, CareerConfig, MemberBuilder, ModelRunner,
    PopulationConfig,
};

fn main() -> Result<()> {
    env_logger::init();
    let start = Instant::now();

    let population_size: usize = env::var("POPULATION_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);

    let valuation_year: i32 = env::var("VALUATION_YEAR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| chrono::Local::now().year());

    let runner = match env::var("SEED").ok().and_then(|s| s.parse().ok()) {
        Some(seed) => ModelRunner::with_seed(seed),
        None => ModelRunner::new(),
    };

    let output_path = env::var("OUTPUT_CSV").unwrap_or_else(|_| "cohort_matrix.csv".to_string());

    let assumptions = match env::var("ASSUMPTIONS_DIR") {
        Ok(dir) => Assumptions::from_csv_path(Path::new(&dir))
            .with_context(|| format!("loading assumptions from {}", dir))?,
        Err(_) => Assumptions::default_valuation(),
    };

    let builder = MemberBuilder::new(&assumptions, CareerConfig::default());
    let population = PopulationConfig::with_size(population_size, valuation_year)
        .generate(&builder, &mut runner.trial_rng(0))
        .context("generating population")?;

    let (matrix, rows) = ModelRunner::solve(0, &population);

    let file = File::create(&output_path).with_context(|| format!("creating {}", output_path))?;
    write_matrix_csv(&matrix, BufWriter::new(file))?;

    println!(
        "Wrote {} years x {} cohorts for {} members to {}",
        matrix.row_count(),
        matrix.cohorts.len(),
        population.len(),
        output_path
    );
    for row in rows {
        println!("  {:<10} {:.4}%", row.cohort.to_string(), row.car * 100.0);
    }
    println!("Total time: {:?}", start.elapsed());
    Ok(())
}
