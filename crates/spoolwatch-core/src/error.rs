// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Spoolwatch.

use thiserror::Error;

use crate::types::JobId;

/// Top-level error type for all Spoolwatch operations.
///
/// Internal boundaries pass these as values; only the public API edge raises
/// them to the caller.  Every failed native call carries the name of the
/// operation that failed and the OS error code it reported.
#[derive(Debug, Error)]
pub enum SpoolError {
    // -- Native spooler errors --
    #[error("native call `{operation}` failed (os error {os_error})")]
    NativeCallFailure {
        operation: &'static str,
        os_error: u32,
    },

    #[error("insufficient access rights for printer `{printer}`")]
    InsufficientAccessRights { printer: String },

    #[error("failed to transfer job {job} to `{target}`: {reason}")]
    JobTransferFailure {
        job: JobId,
        target: String,
        reason: String,
    },

    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    // -- Configuration / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SpoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_failure_names_operation_and_code() {
        let err = SpoolError::NativeCallFailure {
            operation: "EnumJobs",
            os_error: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("EnumJobs"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn transfer_failure_names_job_and_target() {
        let err = SpoolError::JobTransferFailure {
            job: JobId(42),
            target: "Accounting Laser".into(),
            reason: "target queue rejected the document".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("Accounting Laser"));
    }
}
