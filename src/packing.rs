//! Pack variable-length sub-sequences into recurrent-network batches.
//!
//! Sub-sequences are sorted by length (longest first) and laid out as the
//! columns of a zero-padded, time-major tensor of shape
//! `(max_len, columns, D)`. Row 0 of every column is a zero start symbol, so
//! a sub-sequence of `n` observations occupies rows `1..=n` and has length
//! `n + 1`. The ground truth for next-step prediction is the same tensor
//! shifted by one step.
//!
//! The packed form stores only the valid steps, interleaved by time:
//!
//! ```text
//! lengths [3, 2, 1]      data rows: a0 b0 c0 | a1 b1 | a2
//! batch_sizes [3, 2, 1]
//! ```

use candle_core::{DType, Device, Tensor};
use rand::seq::index;
use rand::Rng;
use tracing::debug;

use crate::error::{Result, UisRnnError};

/// How many sub-sequences go into one packed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSize {
    /// Use every sub-sequence.
    Full,
    /// Sample this many sub-sequences without replacement.
    Mini(usize),
}

impl From<Option<usize>> for BatchSize {
    fn from(batch_size: Option<usize>) -> Self {
        batch_size.map_or(Self::Full, Self::Mini)
    }
}

/// Variable-length sequences packed time step by time step.
#[derive(Debug, Clone)]
pub struct PackedSequence {
    /// Valid rows of every column, interleaved by time: `(sum(lengths), D)`.
    data: Tensor,
    /// Number of columns still running at each time step.
    batch_sizes: Vec<usize>,
    /// Valid length of each column, non-increasing.
    lengths: Vec<usize>,
}

impl PackedSequence {
    /// Pack a time-major padded tensor of shape `(T, columns, D)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `lengths` does not have one non-zero entry per
    /// column, is not sorted longest first, or exceeds `T`.
    pub fn from_padded(padded: &Tensor, lengths: &[usize]) -> Result<Self> {
        let (steps, columns, _dim) = padded.dims3()?;
        if lengths.len() != columns {
            return Err(UisRnnError::DimensionMismatch {
                expected: columns,
                actual: lengths.len(),
            });
        }
        let Some(&max_len) = lengths.first() else {
            return Err(UisRnnError::empty_input("cannot pack zero columns"));
        };
        if lengths.windows(2).any(|w| w[0] < w[1]) {
            return Err(UisRnnError::invalid_config(
                "lengths must be sorted longest first",
            ));
        }
        if lengths.contains(&0) {
            return Err(UisRnnError::empty_input("packed lengths must be > 0"));
        }
        if max_len > steps {
            return Err(UisRnnError::DimensionMismatch {
                expected: steps,
                actual: max_len,
            });
        }

        let batch_sizes: Vec<usize> = (0..max_len)
            .map(|t| lengths.iter().filter(|&&len| len > t).count())
            .collect();
        let step_rows = batch_sizes
            .iter()
            .enumerate()
            .map(|(t, &bs)| padded.get(t)?.narrow(0, 0, bs))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let data = Tensor::cat(&step_rows, 0)?;

        Ok(Self {
            data,
            batch_sizes,
            lengths: lengths.to_vec(),
        })
    }

    /// Restore the zero-padded tensor of shape `(max_len, columns, D)`.
    ///
    /// # Errors
    ///
    /// Returns error if tensor operations fail.
    pub fn pad(&self) -> Result<Tensor> {
        let columns = self.num_columns();
        let dim = self.data.dim(1)?;
        let mut offset = 0;
        let mut steps = Vec::with_capacity(self.batch_sizes.len());
        for &bs in &self.batch_sizes {
            let valid = self.data.narrow(0, offset, bs)?;
            offset += bs;
            let step = if bs < columns {
                let padding =
                    Tensor::zeros((columns - bs, dim), self.data.dtype(), self.data.device())?;
                Tensor::cat(&[&valid, &padding], 0)?
            } else {
                valid
            };
            steps.push(step);
        }
        Ok(Tensor::stack(&steps, 0)?)
    }

    /// Packed data, shape `(sum(lengths), D)`.
    #[must_use]
    pub const fn data(&self) -> &Tensor {
        &self.data
    }

    /// Number of running columns per time step.
    #[must_use]
    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    /// Valid length of each column, longest first.
    #[must_use]
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Number of packed columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.lengths.len()
    }

    /// Length of the longest column.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.batch_sizes.len()
    }
}

/// A model-ready batch built by [`pack_sequence`].
#[derive(Debug, Clone)]
pub struct PackedBatch {
    /// Packed recurrent input.
    pub input: PackedSequence,
    /// Zero-padded input, shape `(max_len, columns, D)`.
    pub padded: Tensor,
    /// Next-step targets, `padded` without its first row: `(max_len - 1, columns, D)`.
    pub ground_truth: Tensor,
    /// Index into the caller's sub-sequence list for each column.
    pub column_order: Vec<usize>,
}

/// Place `sub` at rows `1..length` of a zero `(max_len, D)` column.
fn padded_column(
    sub: &Tensor,
    length: usize,
    max_len: usize,
    observation_dim: usize,
    device: &Device,
) -> Result<Tensor> {
    let rows = length
        .checked_sub(1)
        .ok_or_else(|| UisRnnError::empty_input("sequence length must count the start row"))?;
    if sub.dims() != [rows, observation_dim] {
        return Err(UisRnnError::shape_mismatch(&[rows, observation_dim], sub.dims()));
    }

    let mut parts = vec![Tensor::zeros((1, observation_dim), DType::F32, device)?];
    if rows > 0 {
        parts.push(sub.to_dtype(DType::F32)?.to_device(device)?);
    }
    if max_len > length {
        parts.push(Tensor::zeros(
            (max_len - length, observation_dim),
            DType::F32,
            device,
        )?);
    }
    Ok(Tensor::cat(&parts, 0)?)
}

/// Build a packed batch and its shifted ground truth.
///
/// Sub-sequences are ordered by descending length (ties keep input order).
/// With [`BatchSize::Mini`], positions in that order are sampled without
/// replacement and sorted, so the batch stays longest first.
///
/// # Arguments
///
/// * `sub_sequences` - Observations per sub-sequence, shape `(length - 1, D)`
/// * `seq_lengths` - Length of each sub-sequence including the start row
/// * `batch_size` - Full batch or mini-batch size
/// * `observation_dim` - `D`
/// * `device` - Device the batch tensors are created on
/// * `rng` - Random source for mini-batch sampling
///
/// # Errors
///
/// Returns [`UisRnnError::InvalidBatchSize`] when a mini-batch is larger
/// than the number of sub-sequences, [`UisRnnError::ShapeMismatch`] when a
/// sub-sequence does not match its length and `observation_dim`, or a
/// tensor error.
pub fn pack_sequence<R: Rng + ?Sized>(
    sub_sequences: &[Tensor],
    seq_lengths: &[usize],
    batch_size: BatchSize,
    observation_dim: usize,
    device: &Device,
    rng: &mut R,
) -> Result<PackedBatch> {
    if sub_sequences.len() != seq_lengths.len() {
        return Err(UisRnnError::DimensionMismatch {
            expected: seq_lengths.len(),
            actual: sub_sequences.len(),
        });
    }
    let num_clusters = seq_lengths.len();
    if num_clusters == 0 {
        return Err(UisRnnError::empty_input("no sub-sequences to pack"));
    }

    let mut sorted_order: Vec<usize> = (0..num_clusters).collect();
    sorted_order.sort_by(|&a, &b| seq_lengths[b].cmp(&seq_lengths[a]));

    let column_order: Vec<usize> = match batch_size {
        BatchSize::Full => sorted_order,
        BatchSize::Mini(size) => {
            if size == 0 || size > num_clusters {
                return Err(UisRnnError::InvalidBatchSize {
                    requested: size,
                    available: num_clusters,
                });
            }
            let mut positions = index::sample(rng, num_clusters, size).into_vec();
            positions.sort_unstable();
            positions.into_iter().map(|p| sorted_order[p]).collect()
        }
    };

    let lengths: Vec<usize> = column_order.iter().map(|&i| seq_lengths[i]).collect();
    let max_len = lengths[0];

    let columns = column_order
        .iter()
        .zip(&lengths)
        .map(|(&i, &len)| padded_column(&sub_sequences[i], len, max_len, observation_dim, device))
        .collect::<Result<Vec<_>>>()?;
    let padded = Tensor::stack(&columns, 1)?;

    let input = PackedSequence::from_padded(&padded, &lengths)?;
    let ground_truth = padded.narrow(0, 1, max_len - 1)?;

    debug!(
        columns = column_order.len(),
        max_len,
        observation_dim,
        "packed sequence batch"
    );

    Ok(PackedBatch {
        input,
        padded,
        ground_truth,
        column_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn filled(rows: usize, dim: usize, value: f32) -> Tensor {
        (Tensor::ones((rows, dim), DType::F32, &Device::Cpu).unwrap() * f64::from(value)).unwrap()
    }

    fn fixture() -> (Vec<Tensor>, Vec<usize>) {
        // Lengths include the start row.
        let subs = vec![filled(1, 2, 1.0), filled(3, 2, 2.0), filled(2, 2, 3.0)];
        (subs, vec![2, 4, 3])
    }

    #[test]
    fn test_batch_size_from_option() {
        assert_eq!(BatchSize::from(None), BatchSize::Full);
        assert_eq!(BatchSize::from(Some(4)), BatchSize::Mini(4));
    }

    #[test]
    fn test_full_batch_layout() {
        let (subs, lengths) = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let batch =
            pack_sequence(&subs, &lengths, BatchSize::Full, 2, &Device::Cpu, &mut rng).unwrap();

        assert_eq!(batch.column_order, vec![1, 2, 0]);
        assert_eq!(batch.input.lengths(), &[4, 3, 2]);
        assert_eq!(batch.input.batch_sizes(), &[3, 3, 2, 1]);
        assert_eq!(batch.padded.dims(), &[4, 3, 2]);
        assert_eq!(batch.ground_truth.dims(), &[3, 3, 2]);
        assert_eq!(batch.input.data().dims(), &[9, 2]);

        let padded: Vec<Vec<Vec<f32>>> = batch.padded.to_vec3().unwrap();
        // Start row is zero everywhere.
        assert_eq!(padded[0], vec![vec![0.0, 0.0]; 3]);
        assert_eq!(padded[1], vec![vec![2.0, 2.0], vec![3.0, 3.0], vec![1.0, 1.0]]);
        assert_eq!(padded[2], vec![vec![2.0, 2.0], vec![3.0, 3.0], vec![0.0, 0.0]]);
        assert_eq!(padded[3], vec![vec![2.0, 2.0], vec![0.0, 0.0], vec![0.0, 0.0]]);
    }

    #[test]
    fn test_ground_truth_is_shifted_input() {
        let (subs, lengths) = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let batch =
            pack_sequence(&subs, &lengths, BatchSize::Full, 2, &Device::Cpu, &mut rng).unwrap();

        let padded: Vec<Vec<Vec<f32>>> = batch.padded.to_vec3().unwrap();
        let truth: Vec<Vec<Vec<f32>>> = batch.ground_truth.to_vec3().unwrap();
        assert_eq!(truth.as_slice(), &padded[1..]);
    }

    #[test]
    fn test_mini_batch_is_sorted_subset() {
        let (subs, lengths) = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..10 {
            let batch =
                pack_sequence(&subs, &lengths, BatchSize::Mini(2), 2, &Device::Cpu, &mut rng)
                    .unwrap();
            assert_eq!(batch.column_order.len(), 2);
            assert_ne!(batch.column_order[0], batch.column_order[1]);
            let got = batch.input.lengths();
            assert!(got[0] >= got[1]);
            assert_eq!(batch.padded.dims(), &[got[0], 2, 2]);
            assert_eq!(batch.ground_truth.dim(0).unwrap(), batch.padded.dim(0).unwrap() - 1);
        }
    }

    #[test]
    fn test_mini_batch_too_large() {
        let (subs, lengths) = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = pack_sequence(&subs, &lengths, BatchSize::Mini(4), 2, &Device::Cpu, &mut rng);
        assert!(matches!(
            result,
            Err(UisRnnError::InvalidBatchSize {
                requested: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn test_wrong_observation_dim() {
        let (subs, lengths) = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = pack_sequence(&subs, &lengths, BatchSize::Full, 3, &Device::Cpu, &mut rng);
        assert!(matches!(result, Err(UisRnnError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_pad_restores_padded_tensor() {
        let (subs, lengths) = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let batch =
            pack_sequence(&subs, &lengths, BatchSize::Full, 2, &Device::Cpu, &mut rng).unwrap();

        let restored: Vec<Vec<Vec<f32>>> = batch.input.pad().unwrap().to_vec3().unwrap();
        let padded: Vec<Vec<Vec<f32>>> = batch.padded.to_vec3().unwrap();
        assert_eq!(restored, padded);
    }

    #[test]
    fn test_from_padded_rejects_unsorted_lengths() {
        let padded = Tensor::zeros((3, 2, 1), DType::F32, &Device::Cpu).unwrap();
        assert!(PackedSequence::from_padded(&padded, &[1, 3]).is_err());
        assert!(PackedSequence::from_padded(&padded, &[4, 1]).is_err());
        assert!(PackedSequence::from_padded(&padded, &[3]).is_err());
        assert!(PackedSequence::from_padded(&padded, &[3, 1]).is_ok());
    }
}
