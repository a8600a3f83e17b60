//! Block-preserving permutation sampling.
//!
//! An index sequence such as `[1, 2, 6, 10, 11, 12]` splits into maximal
//! runs of consecutive integers, `[[1, 2], [6], [10, 11, 12]]`. Sampling
//! shuffles the order of the runs while leaving each run intact, which
//! augments a speaker's sub-sequence without breaking up contiguous turns.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Split `index_sequence` into maximal runs where each entry is one more
/// than the previous.
///
/// # Example
///
/// ```
/// use uisrnn_rs::split_segments;
///
/// let segments = split_segments(&[1, 2, 6, 10, 11, 12]);
/// assert_eq!(segments, vec![&[1, 2][..], &[6][..], &[10, 11, 12][..]]);
/// ```
#[must_use]
pub fn split_segments(index_sequence: &[usize]) -> Vec<&[usize]> {
    index_sequence
        .chunk_by(|prev, next| prev.checked_add(1) == Some(*next))
        .collect()
}

/// Sample `number_samples` block-preserving permutations of `index_sequence`.
///
/// Each sample is the segments of [`split_segments`] concatenated in a
/// uniformly random order. Samples are drawn independently and may repeat.
/// A single-element input yields itself every time.
///
/// # Arguments
///
/// * `index_sequence` - Ascending positions of one cluster's observations
/// * `number_samples` - Number of permuted sequences to return
/// * `rng` - Random source; pass a seeded generator for reproducible draws
#[must_use]
pub fn sample_permuted_segments<R: Rng + ?Sized>(
    index_sequence: &[usize],
    number_samples: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut segments = split_segments(index_sequence);
    debug!(
        len = index_sequence.len(),
        segments = segments.len(),
        number_samples,
        "sampling permuted segments"
    );

    (0..number_samples)
        .map(|_| {
            segments.shuffle(rng);
            segments.concat()
        })
        .collect()
}
