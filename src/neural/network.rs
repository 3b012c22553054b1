//! Feedforward network structure and forward propagation.

use ndarray::{Array1, Array2};
use rand::Rng;

/// Activation applied to every non-input neuron.
///
/// Injected at construction so tests can swap it out; the engine itself
/// always drives with [`tanh`].
pub type Activation = fn(f32) -> f32;

/// Hyperbolic tangent, maps any raw sum into (-1, 1).
pub fn tanh(value: f32) -> f32 {
    value.tanh()
}

/// A fixed-topology feedforward neural network.
///
/// Owns one neuron buffer per layer (layer 0 holds the last input), one
/// bias vector per non-input layer and one weight matrix per layer
/// transition. The weight matrix for layer `i` has shape
/// `(layers[i], layers[i-1])` so that a forward step is a single
/// matrix-vector product. All buffers are owned; copies are always deep.
#[derive(Clone, Debug)]
pub struct Network {
    /// Layer widths, input first. Never changes after construction.
    layers: Vec<usize>,
    /// Cached activations from the last forward pass, one per layer.
    neurons: Vec<Array1<f32>>,
    /// Bias vectors for layers 1.., `biases[i]` belongs to layer `i + 1`.
    pub(crate) biases: Vec<Array1<f32>>,
    /// Weight matrices, `weights[i]` maps layer `i` onto layer `i + 1`.
    pub(crate) weights: Vec<Array2<f32>>,
    fitness: i32,
    activation: Activation,
}

impl Network {
    /// Create a network with every weight and bias drawn uniformly from
    /// `[-weight_range, weight_range]` / `[-bias_range, bias_range]`.
    ///
    /// Fails with [`NetworkError::InvalidTopology`] if the layout has
    /// fewer than two layers or any zero-width layer.
    pub fn new<R: Rng>(
        layers: &[usize],
        weight_range: f32,
        bias_range: f32,
        rng: &mut R,
    ) -> Result<Self, NetworkError> {
        Self::with_activation(layers, weight_range, bias_range, tanh, rng)
    }

    /// Same as [`Network::new`] but with an explicit activation function.
    pub fn with_activation<R: Rng>(
        layers: &[usize],
        weight_range: f32,
        bias_range: f32,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self, NetworkError> {
        if layers.len() < 2 {
            return Err(NetworkError::InvalidTopology(format!(
                "need at least 2 layers, got {}",
                layers.len()
            )));
        }
        if let Some(pos) = layers.iter().position(|&w| w == 0) {
            return Err(NetworkError::InvalidTopology(format!(
                "layer {} has zero width",
                pos
            )));
        }

        let neurons = layers.iter().map(|&w| Array1::zeros(w)).collect();

        let mut biases = Vec::with_capacity(layers.len() - 1);
        for &width in &layers[1..] {
            biases.push(Array1::from_shape_fn(width, |_| uniform(&mut *rng, bias_range)));
        }

        let mut weights = Vec::with_capacity(layers.len() - 1);
        for pair in layers.windows(2) {
            weights.push(Array2::from_shape_fn((pair[1], pair[0]), |_| {
                uniform(&mut *rng, weight_range)
            }));
        }

        Ok(Self {
            layers: layers.to_vec(),
            neurons,
            biases,
            weights,
            fitness: 0,
            activation,
        })
    }

    /// Run one forward pass and return a view of the output layer.
    ///
    /// The returned slice is reused storage; it is only valid until the
    /// next call. Deterministic for identical state and input.
    pub fn forward(&mut self, inputs: &[f32]) -> Result<&[f32], NetworkError> {
        let input_width = self.layers[0];
        if inputs.len() != input_width {
            return Err(NetworkError::DimensionMismatch {
                expected: input_width,
                found: inputs.len(),
            });
        }

        self.neurons[0]
            .as_slice_mut()
            .expect("neuron buffers are contiguous")
            .copy_from_slice(inputs);

        let activation = self.activation;
        for i in 1..self.layers.len() {
            let mut raw = self.weights[i - 1].dot(&self.neurons[i - 1]);
            raw += &self.biases[i - 1];
            raw.mapv_inplace(activation);
            self.neurons[i] = raw;
        }

        Ok(self.output())
    }

    /// Copy this network's weights and biases into `other`.
    ///
    /// Fitness and neuron buffers are not copied; the target keeps its
    /// own. This is the sole reproduction primitive (no crossover).
    pub fn clone_into(&self, other: &mut Network) -> Result<(), NetworkError> {
        if self.layers != other.layers {
            return Err(NetworkError::TopologyMismatch {
                expected: self.layers.clone(),
                found: other.layers.clone(),
            });
        }
        for (src, dst) in self.biases.iter().zip(other.biases.iter_mut()) {
            dst.assign(src);
        }
        for (src, dst) in self.weights.iter().zip(other.weights.iter_mut()) {
            dst.assign(src);
        }
        Ok(())
    }

    /// Overwrite every bias then weight value from a flat slice in
    /// persistence order (biases layer-major, then weights layer-major,
    /// output-neuron-major). The network is untouched unless the arity
    /// matches exactly.
    pub fn assign_parameters(&mut self, values: &[f32]) -> Result<(), NetworkError> {
        if values.len() != self.parameter_count() {
            return Err(NetworkError::DimensionMismatch {
                expected: self.parameter_count(),
                found: values.len(),
            });
        }
        let mut source = values.iter().copied();
        for bias in self.biases.iter_mut() {
            for value in bias.iter_mut() {
                *value = source.next().expect("arity checked above");
            }
        }
        for weight in self.weights.iter_mut() {
            for value in weight.iter_mut() {
                *value = source.next().expect("arity checked above");
            }
        }
        Ok(())
    }

    /// Layer widths, input layer first.
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Cached activations of one layer from the last forward pass.
    pub fn activations(&self, layer: usize) -> &[f32] {
        self.neurons[layer]
            .as_slice()
            .expect("neuron buffers are contiguous")
    }

    /// The output layer's buffer from the last forward pass.
    pub fn output(&self) -> &[f32] {
        self.neurons
            .last()
            .expect("topology has at least two layers")
            .as_slice()
            .expect("neuron buffers are contiguous")
    }

    pub fn fitness(&self) -> i32 {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: i32) {
        self.fitness = fitness;
    }

    pub fn add_fitness(&mut self, delta: i32) {
        self.fitness += delta;
    }

    /// Total number of bias values.
    pub fn bias_count(&self) -> usize {
        self.biases.iter().map(|b| b.len()).sum()
    }

    /// Total number of weight values.
    pub fn weight_count(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum()
    }

    /// Total number of parameters (weights + biases).
    pub fn parameter_count(&self) -> usize {
        self.bias_count() + self.weight_count()
    }

    /// Check that no parameter has gone NaN or infinite.
    pub fn is_valid(&self) -> bool {
        self.biases.iter().all(|b| b.iter().all(|v| v.is_finite()))
            && self.weights.iter().all(|w| w.iter().all(|v| v.is_finite()))
    }
}

fn uniform<R: Rng>(rng: &mut R, range: f32) -> f32 {
    rng.gen_range(-range..=range)
}

/// Errors from network construction and evaluation.
#[derive(Debug)]
pub enum NetworkError {
    /// Fewer than two layers, or a zero-width layer.
    InvalidTopology(String),
    /// Input slice length does not match the input layer width.
    DimensionMismatch { expected: usize, found: usize },
    /// Two networks with different layer layouts.
    TopologyMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTopology(msg) => write!(f, "invalid topology: {}", msg),
            Self::DimensionMismatch { expected, found } => {
                write!(f, "input width mismatch: expected {}, found {}", expected, found)
            }
            Self::TopologyMismatch { expected, found } => {
                write!(f, "topology mismatch: expected {:?}, found {:?}", expected, found)
            }
        }
    }
}

impl std::error::Error for NetworkError {}
