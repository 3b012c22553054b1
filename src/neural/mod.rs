//! Neural network module for agent brains.
//!
//! Fixed-topology feedforward networks with:
//! - Dense layer representation
//! - Deterministic forward propagation
//! - Per-parameter Bernoulli weight/bias mutation
//! - Deep parameter copies for clone-then-mutate reproduction

mod mutation;
mod network;

pub use network::{tanh, Activation, Network, NetworkError};
