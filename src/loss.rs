//! Variance-weighted squared error over the non-padding rows of a batch.
//!
//! Packed batches are zero padded, and padding rows make the plain mean
//! shrink with the amount of padding. Both losses here divide by the number
//! of real rows instead:
//!
//! ```text
//! loss = sum_rows sum_d w_d * (input - target)^2 / non_padding_rows
//! ```
//!
//! [`weighted_mse_loss`] detects padding by a zero in the first column of the
//! squared error, so a real observation whose first coordinate is predicted
//! exactly is also treated as padding. [`weighted_mse_loss_masked`] takes an
//! explicit row mask and avoids that.

use candle_core::{DType, Tensor};
use tracing::debug;

use crate::error::{Result, UisRnnError};

/// Squared error flattened to `(rows, observation_dim)`.
fn stretched_squared_error(input: &Tensor, target: &Tensor) -> Result<(Tensor, usize, usize)> {
    if input.dims() != target.dims() {
        return Err(UisRnnError::shape_mismatch(input.dims(), target.dims()));
    }
    let dim = *input
        .dims()
        .last()
        .ok_or_else(|| UisRnnError::empty_input("loss input must have at least one dimension"))?;
    if dim == 0 {
        return Err(UisRnnError::empty_input("observation dimension is zero"));
    }
    let rows = input.elem_count() / dim;
    let stretched = input.sub(target)?.sqr()?.reshape((rows, dim))?;
    Ok((stretched, rows, dim))
}

/// Reshape `weight` into a `(1, dim)` row, broadcasting a single value.
fn weight_row(weight: &Tensor, dim: usize, dtype: DType) -> Result<Tensor> {
    let weight = weight.to_dtype(dtype)?;
    match weight.elem_count() {
        1 => Ok(weight.reshape((1, 1))?.broadcast_as((1, dim))?.contiguous()?),
        n if n == dim => Ok(weight.reshape((1, dim))?),
        _ => Err(UisRnnError::shape_mismatch(&[dim], weight.dims())),
    }
}

/// Compute the weighted MSE loss, averaged over non-padding rows only.
///
/// All leading dimensions of `input` and `target` are flattened into rows of
/// width `D` (the last dimension). A row counts as padding when the first
/// column of its squared error is zero. Each output dimension is scaled by
/// the matching entry of `weight` (typically `1 / sigma^2`); a single-element
/// weight is applied to every dimension.
///
/// The result equals `mean(weighted) * D * rows / non_padding_rows`.
///
/// # Arguments
///
/// * `input` - Model output, shape `(..., D)`
/// * `target` - Ground truth with the same shape as `input`
/// * `weight` - Per-dimension weight with `D` elements, or a single element
///
/// # Returns
///
/// A scalar tensor.
///
/// # Errors
///
/// Returns [`UisRnnError::ShapeMismatch`] when shapes disagree and
/// [`UisRnnError::NoValidRows`] when every row is padding.
#[allow(clippy::cast_precision_loss)]
pub fn weighted_mse_loss(input: &Tensor, target: &Tensor, weight: &Tensor) -> Result<Tensor> {
    let (stretched, rows, dim) = stretched_squared_error(input, target)?;

    let non_zero_rows = stretched
        .narrow(1, 0, 1)?
        .ne(0f32)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    if non_zero_rows == 0.0 {
        return Err(UisRnnError::NoValidRows);
    }

    let weighted = stretched.broadcast_mul(&weight_row(weight, dim, stretched.dtype())?)?;
    let scale = dim as f64 * rows as f64 / f64::from(non_zero_rows);
    debug!(rows, dim, non_zero_rows, "weighted mse loss");

    Ok((weighted.mean_all()? * scale)?)
}

/// Compute the weighted MSE loss over the rows selected by `mask`.
///
/// `mask` has one entry per flattened row (any shape with `rows` elements);
/// nonzero entries mark real observations. On batches whose padding rows are
/// entirely zero this matches [`weighted_mse_loss`].
///
/// # Errors
///
/// Returns [`UisRnnError::ShapeMismatch`] when shapes disagree and
/// [`UisRnnError::NoValidRows`] when the mask selects nothing.
pub fn weighted_mse_loss_masked(
    input: &Tensor,
    target: &Tensor,
    weight: &Tensor,
    mask: &Tensor,
) -> Result<Tensor> {
    let (stretched, rows, dim) = stretched_squared_error(input, target)?;
    if mask.elem_count() != rows {
        return Err(UisRnnError::DimensionMismatch {
            expected: rows,
            actual: mask.elem_count(),
        });
    }

    let mask = mask
        .ne(0f32)?
        .to_dtype(stretched.dtype())?
        .reshape((rows, 1))?;
    let valid_rows = mask.to_dtype(DType::F32)?.sum_all()?.to_scalar::<f32>()?;
    if valid_rows == 0.0 {
        return Err(UisRnnError::NoValidRows);
    }

    let weighted = stretched
        .broadcast_mul(&weight_row(weight, dim, stretched.dtype())?)?
        .broadcast_mul(&mask)?;
    debug!(rows, dim, valid_rows, "masked weighted mse loss");

    Ok((weighted.sum_all()? / f64::from(valid_rows))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn scalar(t: &Tensor) -> f32 {
        t.to_dtype(DType::F32).unwrap().to_scalar::<f32>().unwrap()
    }

    #[test]
    fn test_unit_weight_matches_sum_over_rows() {
        let device = Device::Cpu;
        let input = Tensor::new(&[[1.0f32, 2.0], [3.0, 4.0]], &device).unwrap();
        let target = Tensor::zeros((2, 2), DType::F32, &device).unwrap();
        let weight = Tensor::new(&[1.0f32, 1.0], &device).unwrap();

        let loss = weighted_mse_loss(&input, &target, &weight).unwrap();
        // (1 + 4 + 9 + 16) / 2 rows
        assert!((scalar(&loss) - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_padding_rows_do_not_dilute() {
        let device = Device::Cpu;
        let input = Tensor::new(&[[1.0f32, 1.0], [0.0, 0.0], [0.0, 0.0]], &device).unwrap();
        let target = Tensor::zeros((3, 2), DType::F32, &device).unwrap();
        let weight = Tensor::new(&[2.0f32, 3.0], &device).unwrap();

        let loss = weighted_mse_loss(&input, &target, &weight).unwrap();
        assert!((scalar(&loss) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_scalar_weight_broadcasts() {
        let device = Device::Cpu;
        let input = Tensor::new(&[[[1.0f32, 2.0]], [[0.5, 0.5]]], &device).unwrap();
        let target = Tensor::zeros((2, 1, 2), DType::F32, &device).unwrap();
        let scalar_weight = Tensor::new(&[0.5f32], &device).unwrap();
        let full_weight = Tensor::new(&[0.5f32, 0.5], &device).unwrap();

        let a = weighted_mse_loss(&input, &target, &scalar_weight).unwrap();
        let b = weighted_mse_loss(&input, &target, &full_weight).unwrap();
        assert!((scalar(&a) - scalar(&b)).abs() < 1e-6);
    }

    #[test]
    fn test_all_padding_is_error() {
        let device = Device::Cpu;
        let zeros = Tensor::zeros((4, 3), DType::F32, &device).unwrap();
        let weight = Tensor::ones(3, DType::F32, &device).unwrap();

        let result = weighted_mse_loss(&zeros, &zeros, &weight);
        assert!(matches!(result, Err(UisRnnError::NoValidRows)));
    }

    #[test]
    fn test_shape_mismatch() {
        let device = Device::Cpu;
        let a = Tensor::zeros((2, 3), DType::F32, &device).unwrap();
        let b = Tensor::zeros((3, 2), DType::F32, &device).unwrap();
        let weight = Tensor::ones(3, DType::F32, &device).unwrap();

        assert!(matches!(
            weighted_mse_loss(&a, &b, &weight),
            Err(UisRnnError::ShapeMismatch { .. })
        ));

        let bad_weight = Tensor::ones(2, DType::F32, &device).unwrap();
        assert!(weighted_mse_loss(&a, &a, &bad_weight).is_err());
    }

    #[test]
    fn test_masked_matches_unmasked_on_padded_batch() {
        let device = Device::Cpu;
        let input = Tensor::new(
            &[[[0.3f32, -1.0], [0.0, 0.0]], [[2.0, 0.5], [1.5, 1.0]]],
            &device,
        )
        .unwrap();
        let target = Tensor::zeros((2, 2, 2), DType::F32, &device).unwrap();
        let weight = Tensor::new(&[1.5f32, 0.25], &device).unwrap();
        let mask = Tensor::new(&[[1u8, 0], [1, 1]], &device).unwrap();

        let plain = weighted_mse_loss(&input, &target, &weight).unwrap();
        let masked = weighted_mse_loss_masked(&input, &target, &weight, &mask).unwrap();
        assert!((scalar(&plain) - scalar(&masked)).abs() < 1e-5);
    }

    #[test]
    fn test_masked_keeps_exact_first_column() {
        let device = Device::Cpu;
        // First coordinate predicted exactly: the zero convention drops this row.
        let input = Tensor::new(&[[0.0f32, 2.0]], &device).unwrap();
        let target = Tensor::zeros((1, 2), DType::F32, &device).unwrap();
        let weight = Tensor::new(&[1.0f32, 1.0], &device).unwrap();
        let mask = Tensor::new(&[1u8], &device).unwrap();

        assert!(weighted_mse_loss(&input, &target, &weight).is_err());
        let masked = weighted_mse_loss_masked(&input, &target, &weight, &mask).unwrap();
        assert!((scalar(&masked) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_masked_rejects_wrong_mask_length() {
        let device = Device::Cpu;
        let input = Tensor::ones((3, 2), DType::F32, &device).unwrap();
        let weight = Tensor::ones(2, DType::F32, &device).unwrap();
        let mask = Tensor::ones(2, DType::U8, &device).unwrap();

        assert!(matches!(
            weighted_mse_loss_masked(&input, &input, &weight, &mask),
            Err(UisRnnError::DimensionMismatch { .. })
        ));
    }
}
