//! Binary logistic regression over sparse rows, trained with seeded SGD.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::vectorizer::SparseVec;

/// SGD hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty strength, applied to the weights a sample touches.
    pub l2: f64,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 0.5,
            l2: 1e-6,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    /// Train on rows with targets in {0.0, 1.0}.
    ///
    /// Samples are shuffled every epoch with a fixed seed, so training the
    /// same corpus twice yields the same weights.
    pub fn fit(rows: &[SparseVec], targets: &[f64], n_features: usize, opts: TrainOptions) -> Self {
        let mut model = Self {
            weights: vec![0.0; n_features],
            bias: 0.0,
        };
        if rows.is_empty() {
            return model;
        }

        let mut rng = StdRng::seed_from_u64(opts.seed);
        let mut order: Vec<usize> = (0..rows.len()).collect();

        for epoch in 0..opts.epochs {
            order.shuffle(&mut rng);
            // Inverse-scaling step size
            let lr = opts.learning_rate / (1.0 + epoch as f64).sqrt();

            for &i in &order {
                let row = &rows[i];
                let err = model.predict_proba(row) - targets[i];
                for &(j, x) in row {
                    let w = &mut model.weights[j];
                    *w -= lr * (err * x + opts.l2 * *w);
                }
                model.bias -= lr * err;
            }
        }

        model
    }

    /// Probability that the row is positive.
    pub fn predict_proba(&self, row: &SparseVec) -> f64 {
        let z = row
            .iter()
            .filter_map(|&(j, x)| self.weights.get(j).map(|w| w * x))
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }

    pub fn n_features(&self) -> usize {
        self.weights.len()
    }
}
