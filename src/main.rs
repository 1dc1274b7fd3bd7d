//! Pension CAR CLI
//!
//! Runs the Monte Carlo CAR model over a synthetic or loaded member population.
//! Every flag can also be set through the environment variable shown in --help.
//! Set --json for machine-readable output.

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use log::info;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use pension_car::{
    fund::{FundYear, PensionFund},
    population::load_snapshots,
    report::{format_summary, write_fund_csv, write_results_csv, PopulationReport},
    scenario::CohortSummary,
    Assumptions, CareerConfig, MemberBuilder, MemberPopulation, ModelRunner, PopulationConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "pension_car",
    about = "Monte Carlo estimate of the compound annual rate of return a pension plan pays its members"
)]
struct Cli {
    #[arg(long, env = "TRIALS", default_value_t = 100)]
    trials: usize,

    #[arg(long, env = "POPULATION_SIZE", default_value_t = 100, help = "Synthetic members per trial")]
    population_size: usize,

    #[arg(long, env = "VALUATION_YEAR", help = "Defaults to the current calendar year")]
    valuation_year: Option<i32>,

    #[arg(long, env = "SEED", help = "Base seed; trial i uses seed + i")]
    seed: Option<u64>,

    #[arg(long, env = "ASSUMPTIONS_DIR", help = "Directory of assumption CSV files")]
    assumptions: Option<PathBuf>,

    #[arg(long, env = "MEMBERS_CSV", help = "Member snapshots to simulate instead of a synthetic population")]
    members: Option<PathBuf>,

    #[arg(long, env = "OUTPUT_CSV", help = "Write trial,cohort,car rows here")]
    output: Option<PathBuf>,

    #[arg(long, env = "JSON_OUTPUT")]
    json: bool,

    #[arg(long, env = "INCLUDE_DISABILITY")]
    include_disability: bool,

    #[arg(long, env = "FUND_ASSETS", help = "Roll the first trial's plan flows through a fund with these assets")]
    fund_assets: Option<f64>,

    #[arg(long, env = "FUND_OUTPUT", requires = "fund_assets", help = "Write the fund projection here")]
    fund_output: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunOutput {
    trials: usize,
    valuation_year: i32,
    seed: Option<u64>,
    population: PopulationReport,
    summary: Vec<CohortSummary>,
    fund: Option<Vec<FundYear>>,
    execution_time_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    let valuation_year = cli
        .valuation_year
        .unwrap_or_else(|| chrono::Local::now().year());

    let assumptions = match &cli.assumptions {
        Some(dir) => Assumptions::from_csv_path(dir)
            .with_context(|| format!("loading assumptions from {}", dir.display()))?,
        None => Assumptions::default_valuation(),
    };
    let career = CareerConfig {
        include_disability: cli.include_disability,
        ..CareerConfig::default()
    };

    let snapshots = match &cli.members {
        Some(path) => Some(
            load_snapshots(path).with_context(|| format!("loading members from {}", path.display()))?,
        ),
        None => None,
    };
    let synthetic = PopulationConfig::with_size(cli.population_size, valuation_year);

    let construct = |rng: &mut ChaCha20Rng| {
        let builder = MemberBuilder::new(&assumptions, career.clone());
        match &snapshots {
            Some(snapshots) => MemberPopulation::from_snapshots(snapshots, &builder, rng),
            None => synthetic.generate(&builder, rng),
        }
    };

    let runner = match cli.seed {
        Some(seed) => ModelRunner::with_seed(seed),
        None => ModelRunner::new(),
    };
    let result = runner.run(&construct, cli.trials).context("running trials")?;
    let summary = result.summarize();

    // Seeded runs rebuild trial 0's population; unseeded runs draw a fresh one
    let sample = construct(&mut runner.trial_rng(0)).context("building sample population")?;
    let population = PopulationReport::new(&sample, valuation_year);

    let fund = cli.fund_assets.map(|assets| {
        let (matrix, _) = ModelRunner::solve(0, &sample);
        let flows: Vec<(i32, f64)> = matrix
            .total_flows()
            .into_iter()
            .filter(|&(year, _)| year > valuation_year)
            .collect();
        let mut fund = PensionFund::with_defaults(assets, valuation_year);
        fund.project(&flows, &mut runner.fund_rng(0))
    });

    if let Some(path) = &cli.output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_results_csv(&result, BufWriter::new(file))?;
        info!("Results written to {}", path.display());
    }
    if let (Some(path), Some(rows)) = (&cli.fund_output, &fund) {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_fund_csv(rows, BufWriter::new(file))?;
        info!("Fund projection written to {}", path.display());
    }

    let execution_time_ms = start.elapsed().as_millis() as u64;

    if cli.json {
        let output = RunOutput {
            trials: cli.trials,
            valuation_year,
            seed: cli.seed,
            population,
            summary,
            fund,
            execution_time_ms,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Pension CAR v{}", env!("CARGO_PKG_VERSION"));
    println!("=================\n");
    println!("{}\n", population);
    println!("CAR by retirement cohort over {} trials:", cli.trials);
    print!("{}", format_summary(&summary));

    if let Some(rows) = &fund {
        let shortfall: f64 = rows.iter().map(|r| r.shortfall).sum();
        if let Some(last) = rows.last() {
            println!(
                "\nFund: ${:.2} in assets at {}, ${:.2} of pay-go shortfall",
                last.assets.total(),
                last.year,
                shortfall
            );
        }
    }

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
