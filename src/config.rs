//! Configuration for the evolution engine.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::scoring::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Networks always drive with two outputs: forward throttle and steering.
pub const OUTPUT_WIDTH: usize = 2;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub track: TrackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network layout and initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of distance sensors, which is also the input layer width
    pub sensor_count: usize,
    /// Initial weights are drawn from (-weight_range, weight_range)
    pub weight_range: f32,
    /// Initial biases are drawn from (-bias_range, bias_range)
    pub bias_range: f32,
}

impl NetworkConfig {
    /// The fixed layer layout: sensors, one hidden layer at 70% of the
    /// sensor width, two outputs.
    pub fn layout(&self) -> Vec<usize> {
        let hidden = (self.sensor_count as f32 * 0.7).floor() as usize;
        vec![self.sensor_count, hidden, OUTPUT_WIDTH]
    }
}

/// Selection and mutation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Agents simulated per generation
    pub population_size: usize,
    /// Per-parameter mutation probability, in percent
    pub mutation_probability: i32,
    /// Magnitude of one mutation nudge
    pub mutation_amount: f32,
    /// Seconds without a checkpoint capture before an agent is deactivated
    pub checkpoint_timeout: f32,
}

/// Geometry of the reference corridor environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Corridor length in meters
    pub length: f32,
    /// Corridor width in meters
    pub width: f32,
    /// Distance between scoring gates
    pub gate_spacing: f32,
    /// Points awarded by each gate
    pub gate_points: i32,
    /// Sensor rays clamp to this distance
    pub max_sight: f32,
    /// Simulation tick length in seconds
    pub tick_seconds: f32,
}

/// Logging and stats cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Generations between stats lines
    pub stats_interval: u32,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            evolution: EvolutionConfig::default(),
            scoring: ScoringConfig::default(),
            track: TrackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            sensor_count: 5,
            weight_range: 0.5,
            bias_range: 0.5,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            mutation_probability: 20,
            mutation_amount: 0.5,
            checkpoint_timeout: 0.7,
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            length: 100.0,
            width: 4.0,
            gate_spacing: 2.0,
            gate_points: 10,
            max_sight: 20.0,
            tick_seconds: 0.02,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.network.sensor_count < 2 {
            return Err("sensor_count must be at least 2 for a non-empty hidden layer".to_string());
        }
        if self.network.weight_range < 0.0 || self.network.bias_range < 0.0 {
            return Err("initialization ranges must be non-negative".to_string());
        }
        if self.evolution.population_size == 0 {
            return Err("population_size must be > 0".to_string());
        }
        if self.evolution.mutation_amount < 0.0 {
            return Err("mutation_amount must be non-negative".to_string());
        }
        if self.evolution.checkpoint_timeout <= 0.0 {
            return Err("checkpoint_timeout must be > 0".to_string());
        }
        if self.track.length <= 0.0 || self.track.width <= 0.0 {
            return Err("track dimensions must be > 0".to_string());
        }
        if self.track.gate_spacing <= 0.0 {
            return Err("gate_spacing must be > 0".to_string());
        }
        if self.track.tick_seconds <= 0.0 {
            return Err("tick_seconds must be > 0".to_string());
        }
        Ok(())
    }
}
