//! Configuration types consumed by the UIS-RNN training utilities.
//!
//! These are plain read-only structs supplied by the training loop:
//! - [`ModelArgs`]: network shape and clustering prior settings
//! - [`TrainingArgs`]: optimizer, batching and variance prior settings

use serde::{Deserialize, Serialize};

use crate::error::{Result, UisRnnError};

/// Model hyperparameters.
///
/// # Example
///
/// ```
/// use uisrnn_rs::ModelArgs;
///
/// let args = ModelArgs::default()
///     .with_observation_dim(64)
///     .with_rnn_hidden_size(128);
/// assert!(args.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArgs {
    /// Dimension of each observation vector.
    pub observation_dim: usize,

    /// Hidden size of the recurrent layers.
    pub rnn_hidden_size: usize,

    /// Number of stacked recurrent layers.
    pub rnn_depth: usize,

    /// Dropout rate between recurrent layers.
    pub rnn_dropout: f64,

    /// Fixed speaker-change probability. Estimated from data when `None`.
    pub transition_bias: Option<f64>,

    /// Concentration parameter of the Chinese restaurant process prior.
    pub crp_alpha: f64,

    /// Fixed observation variance. Estimated from data when `None`.
    pub sigma2: Option<f64>,
}

impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            observation_dim: 256,
            rnn_hidden_size: 512,
            rnn_depth: 1,
            rnn_dropout: 0.2,
            transition_bias: None,
            crp_alpha: 1.0,
            sigma2: None,
        }
    }
}

impl ModelArgs {
    /// Set the observation dimension.
    #[must_use]
    pub const fn with_observation_dim(mut self, dim: usize) -> Self {
        self.observation_dim = dim;
        self
    }

    /// Set the recurrent hidden size.
    #[must_use]
    pub const fn with_rnn_hidden_size(mut self, size: usize) -> Self {
        self.rnn_hidden_size = size;
        self
    }

    /// Set the recurrent depth.
    #[must_use]
    pub const fn with_rnn_depth(mut self, depth: usize) -> Self {
        self.rnn_depth = depth;
        self
    }

    /// Set the dropout rate.
    #[must_use]
    pub const fn with_rnn_dropout(mut self, dropout: f64) -> Self {
        self.rnn_dropout = dropout;
        self
    }

    /// Set the CRP concentration parameter.
    #[must_use]
    pub const fn with_crp_alpha(mut self, alpha: f64) -> Self {
        self.crp_alpha = alpha;
        self
    }

    /// Fix the transition bias instead of estimating it.
    #[must_use]
    pub const fn with_transition_bias(mut self, bias: Option<f64>) -> Self {
        self.transition_bias = bias;
        self
    }

    /// Check that the values describe a buildable model.
    ///
    /// # Errors
    ///
    /// Returns [`UisRnnError::InvalidConfig`] on the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.observation_dim == 0 {
            return Err(UisRnnError::invalid_config("observation_dim must be > 0"));
        }
        if self.rnn_hidden_size == 0 {
            return Err(UisRnnError::invalid_config("rnn_hidden_size must be > 0"));
        }
        if self.rnn_depth == 0 {
            return Err(UisRnnError::invalid_config("rnn_depth must be > 0"));
        }
        if !(0.0..1.0).contains(&self.rnn_dropout) {
            return Err(UisRnnError::invalid_config(format!(
                "rnn_dropout must be in [0, 1), got {}",
                self.rnn_dropout
            )));
        }
        if self.crp_alpha <= 0.0 {
            return Err(UisRnnError::invalid_config("crp_alpha must be > 0"));
        }
        if let Some(bias) = self.transition_bias {
            if !(0.0..=1.0).contains(&bias) {
                return Err(UisRnnError::invalid_config(format!(
                    "transition_bias must be in [0, 1], got {bias}"
                )));
            }
        }
        if matches!(self.sigma2, Some(s) if s <= 0.0) {
            return Err(UisRnnError::invalid_config("sigma2 must be > 0"));
        }
        Ok(())
    }
}

/// Training hyperparameters.
///
/// `batch_size = None` selects full-batch packing; `Some(n)` samples `n`
/// sub-sequences per step.
///
/// # Example
///
/// ```
/// use uisrnn_rs::TrainingArgs;
///
/// let args = TrainingArgs::default()
///     .with_batch_size(None)
///     .with_num_permutations(1);
/// assert!(args.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArgs {
    /// Initial learning rate.
    pub learning_rate: f64,

    /// Steps after which the learning rate halves. Zero disables decay.
    pub learning_rate_half_life: usize,

    /// Number of training iterations.
    pub train_iteration: usize,

    /// Sub-sequences per mini-batch, or `None` for full batch.
    pub batch_size: Option<usize>,

    /// Block-preserving permutations sampled per cluster.
    pub num_permutations: usize,

    /// Shape of the inverse-gamma prior on the observation variance.
    pub sigma_alpha: f64,

    /// Scale of the inverse-gamma prior on the observation variance.
    pub sigma_beta: f64,

    /// Weight of the L2 regularization term.
    pub regularization_weight: f64,

    /// Gradient clipping norm.
    pub grad_max_norm: f64,

    /// Seed for the sampling random source.
    pub seed: u64,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            learning_rate_half_life: 0,
            train_iteration: 20_000,
            batch_size: Some(10),
            num_permutations: 10,
            sigma_alpha: 1.0,
            sigma_beta: 1.0,
            regularization_weight: 1e-5,
            grad_max_norm: 5.0,
            seed: 42,
        }
    }
}

impl TrainingArgs {
    /// Set the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the learning rate half life.
    #[must_use]
    pub const fn with_learning_rate_half_life(mut self, steps: usize) -> Self {
        self.learning_rate_half_life = steps;
        self
    }

    /// Set the mini-batch size (`None` for full batch).
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of permutations per cluster.
    #[must_use]
    pub const fn with_num_permutations(mut self, n: usize) -> Self {
        self.num_permutations = n;
        self
    }

    /// Set the variance prior parameters.
    #[must_use]
    pub const fn with_sigma_prior(mut self, alpha: f64, beta: f64) -> Self {
        self.sigma_alpha = alpha;
        self.sigma_beta = beta;
        self
    }

    /// Set the regularization weight.
    #[must_use]
    pub const fn with_regularization_weight(mut self, weight: f64) -> Self {
        self.regularization_weight = weight;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check that the values describe a runnable training job.
    ///
    /// # Errors
    ///
    /// Returns [`UisRnnError::InvalidConfig`] on the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 {
            return Err(UisRnnError::invalid_config("learning_rate must be > 0"));
        }
        if self.batch_size == Some(0) {
            return Err(UisRnnError::invalid_config("batch_size must be > 0"));
        }
        if self.num_permutations == 0 {
            return Err(UisRnnError::invalid_config("num_permutations must be > 0"));
        }
        if self.sigma_alpha <= 0.0 || self.sigma_beta <= 0.0 {
            return Err(UisRnnError::invalid_config(
                "sigma_alpha and sigma_beta must be > 0",
            ));
        }
        if self.regularization_weight < 0.0 {
            return Err(UisRnnError::invalid_config(
                "regularization_weight must be >= 0",
            ));
        }
        Ok(())
    }
}
