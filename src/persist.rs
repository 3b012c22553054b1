//! Text persistence for network parameters.
//!
//! One value per line: integer fitness first, then every bias in
//! layer-major order, then every weight in layer-major,
//! output-neuron-major order. No header, no versioning; topology
//! compatibility is validated by counting values before any in-memory
//! state is touched.

use crate::neural::Network;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Errors from saving or loading a network file
#[derive(Debug)]
pub enum PersistError {
    Io(std::io::Error),
    /// A line that should hold a number does not parse
    Parse { line: usize, text: String },
    /// The file's parameter count does not fit the network's topology
    TopologyMismatch { expected: usize, found: usize },
}

impl std::fmt::Display for PersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Parse { line, text } => {
                write!(f, "line {}: cannot parse {:?} as a number", line, text)
            }
            Self::TopologyMismatch { expected, found } => {
                write!(
                    f,
                    "parameter count mismatch: network holds {}, file holds {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for PersistError {}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Write a network's fitness and parameters, overwriting `path`.
pub fn save_network<P: AsRef<Path>>(path: P, network: &Network) -> Result<(), PersistError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", network.fitness())?;

    for bias in network.biases.iter() {
        for value in bias.iter() {
            writeln!(writer, "{}", value)?;
        }
    }
    for weight in network.weights.iter() {
        // Row-major iteration matches the output-neuron-major convention.
        for value in weight.iter() {
            writeln!(writer, "{}", value)?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Load fitness and parameters from `path` into `network`.
///
/// The whole file is parsed and its arity validated before the network is
/// modified, so a failed load leaves the network exactly as it was. A file
/// holding only the fitness line is legal and loads just the fitness.
pub fn load_network<P: AsRef<Path>>(path: P, network: &mut Network) -> Result<(), PersistError> {
    let (fitness, values) = parse_file(path)?;

    if values.is_empty() {
        network.set_fitness(fitness);
        return Ok(());
    }

    let expected = network.parameter_count();
    if values.len() != expected {
        return Err(PersistError::TopologyMismatch {
            expected,
            found: values.len(),
        });
    }

    network
        .assign_parameters(&values)
        .expect("arity checked against parameter_count");
    network.set_fitness(fitness);
    Ok(())
}

/// Read just the fitness and parameter count of a network file.
pub fn read_summary<P: AsRef<Path>>(path: P) -> Result<(i32, usize), PersistError> {
    let (fitness, values) = parse_file(path)?;
    Ok((fitness, values.len()))
}

fn parse_file<P: AsRef<Path>>(path: P) -> Result<(i32, Vec<f32>), PersistError> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines = contents.lines().enumerate();

    let (_, first) = lines.next().ok_or(PersistError::Parse {
        line: 1,
        text: String::new(),
    })?;
    let fitness: i32 = first.trim().parse().map_err(|_| PersistError::Parse {
        line: 1,
        text: first.to_string(),
    })?;

    let mut values = Vec::new();
    for (index, line) in lines {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let value: f32 = text.parse().map_err(|_| PersistError::Parse {
            line: index + 1,
            text: text.to_string(),
        })?;
        values.push(value);
    }

    Ok((fitness, values))
}
