//! Per-generation statistics tracking.

use serde::{Deserialize, Serialize};

/// Summary of one finished generation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Number of the finished generation
    pub generation: u32,
    /// Best fitness reached by any agent this generation
    pub best_fitness: i32,
    /// Champion fitness after selection
    pub champion_fitness: i32,
    /// Mean fitness across the generation
    pub mean_fitness: f32,
    /// Whether this generation set a new record
    pub new_record: bool,
}

impl GenerationRecord {
    /// Format as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "Gen:{:4} | Best:{:6} | Champion:{:6} | Mean:{:8.1}{}",
            self.generation,
            self.best_fitness,
            self.champion_fitness,
            self.mean_fitness,
            if self.new_record { " | NEW RECORD" } else { "" }
        )
    }
}

/// Historical record of every finished generation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    pub records: Vec<GenerationRecord>,
}

impl StatsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished generation
    pub fn record(&mut self, record: GenerationRecord) {
        self.records.push(record);
    }

    /// Champion fitness over generations
    pub fn champion_series(&self) -> Vec<(u32, i32)> {
        self.records
            .iter()
            .map(|r| (r.generation, r.champion_fitness))
            .collect()
    }

    /// Save history to a JSON file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from a JSON file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
