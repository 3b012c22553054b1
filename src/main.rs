//! autodrome - CLI entry point
//!
//! Evolves track-driving neural networks on the corridor environment.

use autodrome::{benchmark, persist, Config, Corridor, Driver, Population, PopulationState};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "autodrome")]
#[command(version)]
#[command(about = "Generational neuroevolution engine for track-driving agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evolution session
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of generations to evolve
        #[arg(short, long, default_value = "200")]
        generations: u32,

        /// Output directory for the champion and stats
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Resume evolution from a saved network file
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run a performance benchmark
    Benchmark {
        /// Number of generations
        #[arg(short, long, default_value = "50")]
        generations: u32,

        /// Population size per generation
        #[arg(short, long, default_value = "10")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Inspect a saved network file
    Inspect {
        /// Network file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            generations,
            output,
            seed,
            resume,
            quiet,
        } => run_evolution(config, generations, output, seed, resume, quiet),

        Commands::Benchmark {
            generations,
            population,
        } => run_benchmark(generations, population),

        Commands::Init { output } => generate_config(output),

        Commands::Inspect { file } => inspect_network(file),
    }
}

fn run_evolution(
    config_path: PathBuf,
    generations: u32,
    output: PathBuf,
    seed: Option<u64>,
    resume: Option<PathBuf>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let config = if config_path.exists() {
        println!("Loading config from: {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        println!("Using default configuration");
        Config::default()
    };

    std::fs::create_dir_all(&output)?;

    let env = Corridor::new(&config);
    let mut population = if let Some(s) = seed {
        println!("Using seed: {}", s);
        Population::new_with_seed(config.clone(), s)?
    } else {
        Population::new(config.clone())?
    };

    if let Some(path) = resume {
        population.load_champion(&path)?;
        println!(
            "Resumed from {:?} (fitness {})",
            path,
            population.champion().fitness()
        );
    }

    println!("Starting evolution");
    println!("  Population: {}", config.evolution.population_size);
    println!("  Network layout: {:?}", config.network.layout());
    println!("  Generations: {}", generations);
    println!();

    let mut driver = Driver::new(population, env).with_save_dir(output.clone());
    let stats_interval = config.logging.stats_interval.max(1);

    let start = Instant::now();
    let mut finished = 0;
    while finished < generations {
        if driver.tick() == PopulationState::GenerationEnd {
            finished += 1;
            if !quiet && finished % stats_interval == 0 {
                println!("{}", driver.population.stats().summary());
            }
        }
    }
    let elapsed = start.elapsed();

    println!();
    println!("=== Evolution Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Generations: {}", finished);
    println!("Champion fitness: {}", driver.population.champion().fitness());

    let champion_path = output.join("champion.nn");
    driver.population.save_champion(&champion_path)?;
    println!("Champion saved: {:?}", champion_path);

    let stats_path = output.join("stats_history.json");
    driver
        .history
        .save(stats_path.to_str().ok_or("output path is not UTF-8")?)?;
    println!("Stats history: {:?}", stats_path);

    Ok(())
}

fn run_benchmark(generations: u32, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== autodrome Benchmark ===");
    println!("Generations: {}", generations);
    println!("Population: {}", population);
    println!();

    let result = benchmark(generations, population);
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn inspect_network(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Network File ===");
    println!("File: {:?}", path);
    println!();

    let (fitness, parameter_count) = persist::read_summary(&path)?;
    println!("Fitness: {}", fitness);
    println!("Parameters: {}", parameter_count);

    // Flag files that would not load into the default layout.
    let default_count = {
        let config = Config::default();
        let layout = config.network.layout();
        let biases: usize = layout[1..].iter().sum();
        let weights: usize = layout.windows(2).map(|pair| pair[0] * pair[1]).sum();
        biases + weights
    };
    if parameter_count != 0 && parameter_count != default_count {
        println!(
            "Note: does not match the default layout ({} parameters)",
            default_count
        );
    }

    Ok(())
}
