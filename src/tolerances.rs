// SPDX-License-Identifier: AGPL-3.0-only

//! Validation thresholds and sentinels used by the harness.
//!
//! Every threshold is a percentage of the expected value, matching the
//! comparison performed by [`crate::validation::percentage_error`].

/// Default flagging threshold (percent).
///
/// Kernels that reorder the pair summation (the rayon kernel, GPU ports)
/// land within ~1e-10 % of the serial result on the reference step files;
/// 0.5 % leaves room for fused multiply-add and single-precision
/// intermediate variants while still catching a wrong sign or a missing
/// pair.
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 0.5;

/// Returned by `percentage_error` when the expected value is exactly zero
/// and the computed value is not.
pub const ZERO_EXPECTED_SENTINEL: f64 = 999.9;

/// Significant digits used when printing compared values.
///
/// Equal to the number of decimal digits an f64 round-trips without loss.
pub const REPORT_DIGITS: usize = f64::DIGITS as usize;

/// Significant digits used for raw per-iteration samples.
pub const RAW_SAMPLE_DIGITS: usize = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_digits_is_f64_digits10() {
        assert_eq!(REPORT_DIGITS, 15);
    }

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn sentinel_exceeds_default_threshold() {
        assert!(ZERO_EXPECTED_SENTINEL > DEFAULT_THRESHOLD_PERCENT);
    }
}
