// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the media exchange core.
//!
//! This module defines the status taxonomy surfaced by every fallible
//! operation in the crate, mapping filesystem/mmap/lock failures and the
//! ring-buffer out-of-range conditions onto a single enum.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when creating, attaching to, or operating on a flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested flow id does not exist in the domain.
    #[error("flow not found")]
    FlowNotFound,

    /// The flow's mapping no longer matches the file on disk (recreated
    /// under us), or its header failed validation.
    #[error("flow invalid: {0}")]
    FlowInvalid(String),

    /// Creation was requested with exclusive semantics but the entity
    /// already exists.
    #[error("flow already exists")]
    FlowAlreadyExists,

    /// The header's recorded struct size does not match this build's
    /// expectation.
    #[error("version mismatch: header reports size {found}, expected {expected}")]
    VersionMismatch {
        /// Struct size recorded in the on-disk header.
        found: u32,
        /// Struct size this build expects.
        expected: u32,
    },

    /// The requested data is older than the ring buffer's retained window.
    #[error("out of range: too late")]
    TooLate,

    /// The requested data is not yet available; also returned when a
    /// blocking call's deadline elapses before data arrives (deliberately
    /// indistinguishable from "not yet written" per the caller's next
    /// action being the same either way).
    #[error("out of range: too early")]
    TooEarly,

    /// An argument violated a documented precondition (e.g. a continuous
    /// read wider than half the buffer, an invalid rational rate).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A filesystem or lock operation was refused by the OS.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other low-level I/O failure.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    /// A descriptor JSON blob failed to parse.
    #[error("invalid flow descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

impl Error {
    /// `true` for the two ring-buffer range conditions, which callers
    /// generally handle by resyncing rather than treating as fatal.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::TooLate | Error::TooEarly)
    }
}
