//! # uisrnn-rs
//!
//! Numeric utilities for training an unbounded interleaved-state RNN
//! (UIS-RNN) speaker-clustering model on top of candle.
//!
//! A training step regroups a labelled utterance into per-speaker
//! sub-sequences, optionally augments each speaker with block-preserving
//! permutations, packs the sub-sequences into a zero-padded recurrent batch,
//! and scores model output with a variance-weighted loss that ignores the
//! padding.
//!
//! ## Quick Start
//!
//! ```ignore
//! use candle_core::{Device, Tensor};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use uisrnn_rs::{pack_sequence, resize_sequence, weighted_mse_loss, BatchSize};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let regrouped = resize_sequence(&sequence, &cluster_id, Some(10), &mut rng)?;
//! let batch = pack_sequence(
//!     &regrouped.sub_sequences,
//!     &regrouped.seq_lengths,
//!     BatchSize::Mini(10),
//!     observation_dim,
//!     &Device::Cpu,
//!     &mut rng,
//! )?;
//!
//! let prediction = model.forward(&batch.input)?;
//! let loss = weighted_mse_loss(&prediction, &batch.ground_truth, &inv_sigma2)?;
//! # Ok::<(), uisrnn_rs::UisRnnError>(())
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Model and training hyperparameters
//! - [`error`]: Error types and result alias
//! - [`loss`]: Weighted MSE over non-padding rows
//! - [`permutation`]: Block-preserving permutation sampling
//! - [`regroup`]: Per-cluster regrouping and transition bias
//! - [`packing`]: Padded and packed recurrent batches
//! - [`report`]: Evaluation result log
//!
//! All sampling takes an explicit `rand::Rng`; seed a
//! `rand_chacha::ChaCha8Rng` for reproducible runs.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod loss;
pub mod packing;
pub mod permutation;
pub mod regroup;
pub mod report;

pub use config::{ModelArgs, TrainingArgs};
pub use error::{Result, UisRnnError};
pub use loss::{weighted_mse_loss, weighted_mse_loss_masked};
pub use packing::{pack_sequence, BatchSize, PackedBatch, PackedSequence};
pub use permutation::{sample_permuted_segments, split_segments};
pub use regroup::{resize_sequence, transition_bias, RegroupedSequence};
pub use report::{format_result, output_result, result_file_name};
