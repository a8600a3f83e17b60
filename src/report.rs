//! Evaluation result formatting and the append-only result log.
//!
//! Each evaluation run appends one block to
//! `layer_<hidden>_<depth>_<dropout>_result.txt`:
//!
//! ```text
//! Config:
//!   sigma_alpha: 1.0
//!   ...
//! Performance:
//!   averaged accuracy: 0.912500
//!   accuracy numbers for all testing sequences:
//!     0.900000
//!     0.925000
//! ================================================================================
//! ```

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{ModelArgs, TrainingArgs};
use crate::error::{Result, UisRnnError};

/// Width of the `=` rule closing each result block.
pub const SEPARATOR_WIDTH: usize = 80;

/// Render a float the way the result log has always shown them:
/// integral values keep one decimal, tiny and huge values use a two-digit
/// signed exponent.
fn display_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = value.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let formatted = format!("{value:e}");
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exponent.abs());
            }
        }
        return formatted;
    }
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// File name of the result log for a model shape.
#[must_use]
pub fn result_file_name(model_args: &ModelArgs) -> String {
    format!(
        "layer_{}_{}_{:.1}_result.txt",
        model_args.rnn_hidden_size, model_args.rnn_depth, model_args.rnn_dropout
    )
}

/// Format the configuration and per-sequence accuracies as one result block.
///
/// `test_record` holds `(accuracy, extra)` pairs; only the accuracy is
/// reported.
///
/// # Errors
///
/// Returns [`UisRnnError::EmptyInput`] when `test_record` is empty.
#[allow(clippy::cast_precision_loss)]
pub fn format_result<T>(
    model_args: &ModelArgs,
    training_args: &TrainingArgs,
    test_record: &[(f64, T)],
) -> Result<String> {
    if test_record.is_empty() {
        return Err(UisRnnError::empty_input("test record is empty"));
    }
    let total_accuracy =
        test_record.iter().map(|(accuracy, _)| accuracy).sum::<f64>() / test_record.len() as f64;
    let batch_size = training_args
        .batch_size
        .map_or_else(|| "None".to_string(), |size| size.to_string());

    let mut output = format!(
        "Config:\n  sigma_alpha: {}\n  sigma_beta: {}\n  crp_alpha: {}\n  \
         learning rate: {}\n  learning rate half life: {}\n  regularization: {}\n  \
         batch size: {}\n\nPerformance:\n  averaged accuracy: {:.6}\n  \
         accuracy numbers for all testing sequences:",
        display_float(training_args.sigma_alpha),
        display_float(training_args.sigma_beta),
        display_float(model_args.crp_alpha),
        display_float(training_args.learning_rate),
        training_args.learning_rate_half_life,
        display_float(training_args.regularization_weight),
        batch_size,
        total_accuracy,
    );
    for (accuracy, _) in test_record {
        let _ = write!(output, "\n    {accuracy:.6}");
    }
    output.push('\n');
    output.push_str(&"=".repeat(SEPARATOR_WIDTH));
    output.push('\n');
    Ok(output)
}

/// Format a result block and append it to the result log in `dir`.
///
/// The log is created if absent. Returns the formatted block.
///
/// # Errors
///
/// Returns [`UisRnnError::EmptyInput`] for an empty record, or
/// [`UisRnnError::Io`] if the log cannot be opened or written.
pub fn output_result<T>(
    model_args: &ModelArgs,
    training_args: &TrainingArgs,
    test_record: &[(f64, T)],
    dir: impl AsRef<Path>,
) -> Result<String> {
    let output = format_result(model_args, training_args, test_record)?;
    let path: PathBuf = dir.as_ref().join(result_file_name(model_args));

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(output.as_bytes())?;
    file.flush()?;

    info!(path = %path.display(), sequences = test_record.len(), "appended evaluation result");
    Ok(output)
}
