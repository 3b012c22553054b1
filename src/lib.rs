//! # autodrome
//!
//! Generational neuroevolution engine for track-driving agents.
//!
//! Small fixed-topology feedforward networks steer simulated cars; each
//! generation the single best network ever observed is cloned and mutated
//! into a fresh population, fitness comes from checkpoint captures scored
//! by lateral precision and speed, and learned parameters persist as plain
//! text files.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use autodrome::{Config, Corridor, Driver, Population};
//!
//! let config = Config::default();
//! let env = Corridor::new(&config);
//! let population = Population::new(config).unwrap();
//!
//! let mut driver = Driver::new(population, env);
//! driver.run_generations(100);
//!
//! println!("Champion fitness: {}", driver.population.champion().fitness());
//! ```
//!
//! ## Persistence
//!
//! ```rust,no_run
//! use autodrome::{Config, Population};
//!
//! let mut population = Population::new(Config::default()).unwrap();
//! population.save_champion("champion.nn").unwrap();
//! population.load_champion("champion.nn").unwrap();
//! ```

pub mod config;
pub mod neural;
pub mod persist;
pub mod population;
pub mod scoring;
pub mod sim;
pub mod stats;

// Re-export main types
pub use config::Config;
pub use neural::Network;
pub use population::{AgentId, Population, PopulationState};
pub use sim::{Corridor, Driver, Environment, TrackEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark on the corridor environment
pub fn benchmark(generations: u32, population_size: usize) -> BenchmarkResult {
    use std::time::Instant;

    let mut config = Config::default();
    config.evolution.population_size = population_size;

    let env = Corridor::new(&config);
    let population = Population::new(config).expect("default layout is valid");
    let mut driver = Driver::new(population, env);

    let start = Instant::now();
    driver.run_generations(generations);
    let elapsed = start.elapsed();

    BenchmarkResult {
        generations,
        population_size,
        champion_fitness: driver.population.champion().fitness(),
        elapsed_secs: elapsed.as_secs_f64(),
        generations_per_second: generations as f64 / elapsed.as_secs_f64(),
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub generations: u32,
    pub population_size: usize,
    pub champion_fitness: i32,
    pub elapsed_secs: f64,
    pub generations_per_second: f64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Generations: {}", self.generations)?;
        writeln!(f, "Population: {}", self.population_size)?;
        writeln!(f, "Champion fitness: {}", self.champion_fitness)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} generations/s", self.generations_per_second)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(3, 5);
        assert_eq!(result.generations, 3);
        assert!(result.generations_per_second > 0.0);
    }
}
