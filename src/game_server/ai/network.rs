//! Small fully connected network with mutation-based updates
//!
//! Every layer is ReLU-activated and the final activations are passed through
//! softmax, so outputs sum to 1 and read as relative preferences.

use rand::Rng;

/// Largest perturbation applied to a mutated weight or bias
const MUTATION_VARIATION: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct Network {
    layer_sizes: Vec<usize>,
    layers: Vec<Layer>,
}

#[derive(Debug, Clone)]
struct Layer {
    /// One weight row per neuron, one column per input
    weights: Vec<Vec<f32>>,
    biases: Vec<f32>,
}

impl Network {
    /// Random weights and biases in `[-1, 1)`
    ///
    /// Panics if fewer than two layers are given or any layer is empty.
    pub fn new(layer_sizes: &[usize], rng: &mut impl Rng) -> Self {
        assert!(layer_sizes.len() >= 2, "need at least 2 layers");
        assert!(layer_sizes.iter().all(|&s| s > 0), "empty layers not allowed");

        let layers = layer_sizes
            .windows(2)
            .map(|pair| Layer::new(pair[1], pair[0], rng))
            .collect();

        Self {
            layer_sizes: layer_sizes.to_vec(),
            layers,
        }
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    pub fn output_size(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    /// Forward pass
    ///
    /// Missing inputs read as zero; extra inputs are ignored.
    pub fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        let mut activations = inputs.to_vec();
        activations.resize(self.input_size(), 0.0);

        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        softmax(&activations)
    }

    /// Perturb each weight and bias with probability `rate`
    pub fn mutate(&mut self, rate: f32, rng: &mut impl Rng) {
        for layer in &mut self.layers {
            layer.mutate(rate, rng);
        }
    }

    /// Flattened parameters, for comparing networks
    pub fn parameters(&self) -> Vec<f32> {
        self.layers
            .iter()
            .flat_map(|l| l.weights.iter().flatten().chain(l.biases.iter()).copied())
            .collect()
    }
}

impl Layer {
    fn new(size: usize, inputs: usize, rng: &mut impl Rng) -> Self {
        let weights: Vec<Vec<f32>> = (0..size)
            .map(|_| (0..inputs).map(|_| rng.gen_range(-1.0..1.0)).collect::<Vec<f32>>())
            .collect();
        let biases: Vec<f32> = (0..size).map(|_| rng.gen_range(-1.0..1.0)).collect();

        Self { weights, biases }
    }

    fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let sum = row.iter().zip(inputs).fold(*bias, |acc, (w, x)| acc + w * x);
                sum.max(0.0)
            })
            .collect()
    }

    fn mutate(&mut self, rate: f32, rng: &mut impl Rng) {
        for (row, bias) in self.weights.iter_mut().zip(self.biases.iter_mut()) {
            for weight in row.iter_mut() {
                if rng.gen::<f32>() < rate {
                    *weight += rng.gen_range(-MUTATION_VARIATION..MUTATION_VARIATION);
                }
            }
            if rng.gen::<f32>() < rate {
                *bias += rng.gen_range(-MUTATION_VARIATION..MUTATION_VARIATION);
            }
        }
    }
}

fn softmax(values: &[f32]) -> Vec<f32> {
    // Shifting by the max keeps exp() finite without changing the result
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value (first on ties)
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn outputs_form_a_distribution() {
        let mut rng = StdRng::seed_from_u64(9);
        let net = Network::new(&[12, 12, 4], &mut rng);
        let inputs: Vec<f32> = (0..12).map(|i| i as f32 / 12.0).collect();

        let outputs = net.forward(&inputs);
        assert_eq!(outputs.len(), 4);
        assert!(outputs.iter().all(|&o| (0.0..=1.0).contains(&o)));
        assert!((outputs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn softmax_survives_large_activations() {
        let out = softmax(&[1000.0, 0.0, 0.0, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_rate_mutation_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = Network::new(&[4, 3, 2], &mut rng);
        let before = net.parameters();
        net.mutate(0.0, &mut rng);
        assert_eq!(net.parameters(), before);
    }

    #[test]
    fn full_rate_mutation_moves_every_parameter_within_bounds() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = Network::new(&[4, 3, 2], &mut rng);
        let before = net.parameters();
        net.mutate(1.0, &mut rng);
        let after = net.parameters();
        assert_eq!(before.len(), 4 * 3 + 3 + 3 * 2 + 2);
        for (b, a) in before.iter().zip(&after) {
            assert!((a - b).abs() <= MUTATION_VARIATION);
        }
        assert_ne!(before, after);
    }

    #[test]
    fn argmax_picks_first_largest() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
