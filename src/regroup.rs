//! Regroup an utterance into per-cluster sub-sequences.

use std::collections::BTreeMap;

use candle_core::Tensor;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Result, UisRnnError};
use crate::permutation::sample_permuted_segments;

/// Per-cluster sub-sequences of one utterance.
///
/// `sub_sequences`, `index_sets` and `seq_lengths` are parallel. Clusters
/// appear in ascending label order and permutations of the same cluster are
/// contiguous.
#[derive(Debug, Clone)]
pub struct RegroupedSequence {
    /// Observations of each sub-sequence, shape `(cluster_size, D)`.
    pub sub_sequences: Vec<Tensor>,
    /// Positions in the original sequence each sub-sequence was gathered from.
    pub index_sets: Vec<Vec<usize>>,
    /// Cluster size plus one, reserving a leading start row when packed.
    pub seq_lengths: Vec<usize>,
    /// Estimated probability of a cluster change per step.
    pub bias: f64,
}

impl RegroupedSequence {
    /// Number of sub-sequences.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sub_sequences.len()
    }

    /// Whether there are no sub-sequences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub_sequences.is_empty()
    }
}

/// Estimate the cluster-transition probability of a labelling.
///
/// Returns `(number of label changes + 1) / len`, which lies in `(0, 1]`.
///
/// # Errors
///
/// Returns [`UisRnnError::EmptyInput`] for an empty labelling.
#[allow(clippy::cast_precision_loss)]
pub fn transition_bias<C: PartialEq>(cluster_id: &[C]) -> Result<f64> {
    if cluster_id.is_empty() {
        return Err(UisRnnError::empty_input("cluster_id is empty"));
    }
    let transitions = cluster_id.windows(2).filter(|w| w[0] != w[1]).count();
    Ok((transitions + 1) as f64 / cluster_id.len() as f64)
}

#[allow(clippy::cast_possible_truncation)]
fn gather_rows(sequence: &Tensor, indices: &[usize]) -> Result<Tensor> {
    let ids: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
    let ids = Tensor::from_vec(ids, indices.len(), sequence.device())?;
    Ok(sequence.index_select(&ids, 0)?)
}

/// Split `sequence` into one sub-sequence per distinct cluster label.
///
/// Labels are processed in ascending order. For each label the matching
/// rows are gathered in their original order. With `num_permutations > 1`
/// each cluster instead contributes that many block-preserving permutations
/// (see [`sample_permuted_segments`]), emitted back to back. Every
/// sub-sequence is tagged with length `cluster_size + 1`.
///
/// # Arguments
///
/// * `sequence` - Observations, shape `(N, D)`
/// * `cluster_id` - One label per observation
/// * `num_permutations` - Permuted copies per cluster; `None` or `1` for none
/// * `rng` - Random source for the permutations
///
/// # Errors
///
/// Returns [`UisRnnError::EmptyInput`] for an empty labelling,
/// [`UisRnnError::DimensionMismatch`] when label and observation counts
/// differ, or a tensor error from the gather.
pub fn resize_sequence<C: Ord, R: Rng + ?Sized>(
    sequence: &Tensor,
    cluster_id: &[C],
    num_permutations: Option<usize>,
    rng: &mut R,
) -> Result<RegroupedSequence> {
    let (num_rows, _dim) = sequence.dims2()?;
    if num_rows != cluster_id.len() {
        return Err(UisRnnError::DimensionMismatch {
            expected: num_rows,
            actual: cluster_id.len(),
        });
    }
    let bias = transition_bias(cluster_id)?;

    let mut clusters: BTreeMap<&C, Vec<usize>> = BTreeMap::new();
    for (position, label) in cluster_id.iter().enumerate() {
        clusters.entry(label).or_default().push(position);
    }

    let permutations = num_permutations.filter(|&n| n > 1);
    if permutations.is_some() && clusters.len() == 1 {
        warn!("single-cluster utterance; permutations only reorder one speaker");
    }

    let mut index_sets = Vec::new();
    let mut seq_lengths = Vec::new();
    for idx_set in clusters.into_values() {
        let length = idx_set.len() + 1;
        match permutations {
            Some(n) => {
                for sampled in sample_permuted_segments(&idx_set, n, rng) {
                    index_sets.push(sampled);
                    seq_lengths.push(length);
                }
            }
            None => {
                index_sets.push(idx_set);
                seq_lengths.push(length);
            }
        }
    }

    let sub_sequences = index_sets
        .iter()
        .map(|indices| gather_rows(sequence, indices))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        observations = num_rows,
        sub_sequences = sub_sequences.len(),
        bias,
        "regrouped sequence"
    );

    Ok(RegroupedSequence {
        sub_sequences,
        index_sets,
        seq_lengths,
        bias,
    })
}
