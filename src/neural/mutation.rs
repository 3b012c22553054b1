//! Genetic mutation of network parameters.

use super::network::Network;
use rand::Rng;

impl Network {
    /// Mutate every bias and weight independently.
    ///
    /// Each parameter is an independent Bernoulli trial: with probability
    /// `probability_percent / 100` the value gets a uniform nudge from
    /// `[-amount, amount]`, otherwise it is left unchanged. Values outside
    /// [0, 100] are accepted and simply degenerate to never (`<= 0`) or
    /// always (`>= 100`) mutating. Parameters are not clamped; drift is
    /// bounded per call by `amount`, not in absolute value.
    pub fn mutate<R: Rng>(&mut self, probability_percent: i32, amount: f32, rng: &mut R) {
        for bias in self.biases.iter_mut() {
            bias.mapv_inplace(|value| nudge(value, probability_percent, amount, &mut *rng));
        }
        for weight in self.weights.iter_mut() {
            weight.mapv_inplace(|value| nudge(value, probability_percent, amount, &mut *rng));
        }
    }
}

fn nudge<R: Rng>(value: f32, probability_percent: i32, amount: f32, rng: &mut R) -> f32 {
    if rng.gen_range(0..100) < probability_percent {
        value + rng.gen_range(-amount..=amount)
    } else {
        value
    }
}
