// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for decoding, list construction, kernels, and validation.
//!
//! Callers match on the variant to pick an exit code: input and capacity
//! failures are always fatal, a `ValidationMismatch` only surfaces when the
//! run was configured to stop at the first flagged comparison.

use std::path::PathBuf;

use thiserror::Error;

/// Errors arising from a benchmark run.
#[derive(Debug, Error)]
pub enum HertzError {
    /// Reading or writing a file failed.
    #[error("I/O error on [{path}]: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad magic number or an impossible count field.
    #[error("format error: {0}")]
    Format(String),

    /// The input ended before a field could be read in full.
    #[error("truncated input: field `{field}` needs {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The neighbor list page budget is exhausted.
    #[error("neighbor list capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// An edge references a particle outside `[0, nnode)`.
    #[error("edge {edge} endpoint {endpoint} is out of range for nnode={nnode}")]
    Index {
        edge: usize,
        endpoint: i64,
        nnode: usize,
    },

    /// Invalid run or page configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The kernel rejected its input or failed during a call.
    #[error("kernel `{kernel}` failed: {message}")]
    Kernel { kernel: String, message: String },

    /// Timing samples are inconsistent with the iteration count.
    #[error("timing error: {0}")]
    Timing(String),

    /// A computed value exceeded the error threshold with die-on-flag set.
    #[error("validation mismatch at {tag}: expected {expected}, computed {computed} ({error:.4}% > {threshold}%)")]
    ValidationMismatch {
        tag: String,
        expected: f64,
        computed: f64,
        error: f64,
        threshold: f64,
    },
}

impl HertzError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a kernel failure.
    pub fn kernel(kernel: &str, message: impl Into<String>) -> Self {
        Self::Kernel {
            kernel: kernel.to_string(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Validation mismatches map to 1 (same as a usage error); malformed
    /// input and every other fatal condition map to 2.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ValidationMismatch { .. } | Self::Config(_) => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_truncated_names_field() {
        let err = HertzError::Truncated {
            field: "edge",
            offset: 120,
            needed: 16,
            available: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("`edge`"));
        assert!(msg.contains("offset 120"));
    }

    #[test]
    fn display_index() {
        let err = HertzError::Index {
            edge: 3,
            endpoint: 7,
            nnode: 5,
        };
        assert_eq!(
            err.to_string(),
            "edge 3 endpoint 7 is out of range for nnode=5"
        );
    }

    #[test]
    fn exit_codes() {
        let mismatch = HertzError::ValidationMismatch {
            tag: "force[0]".into(),
            expected: 1.0,
            computed: 1.1,
            error: 10.0,
            threshold: 5.0,
        };
        assert_eq!(mismatch.exit_code(), 1);
        assert_eq!(HertzError::Format("bad magic".into()).exit_code(), 2);
        assert_eq!(HertzError::Config("num_iter".into()).exit_code(), 1);
    }

    #[test]
    fn io_error_keeps_source() {
        let err = HertzError::io(
            "missing.bin",
            std::io::Error::new(std::io::ErrorKind::NotFound, "nope"),
        );
        let dyn_err: &dyn std::error::Error = &err;
        assert!(dyn_err.source().is_some());
        assert!(err.to_string().contains("missing.bin"));
    }
}
