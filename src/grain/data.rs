// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Zero-copy view of a grain's payload, returned by [`super::reader::GrainReader`].

use crate::header::GrainHeader;

/// Zero-copy view of a grain read from a flow.
///
/// `payload` covers only the bytes backed by `header.committed_slices`; the
/// lifetime `'a` is tied to the [`super::reader::GrainReader`] that produced
/// it and cannot outlive its mapping.
#[derive(Debug)]
pub struct GrainData<'a> {
    /// Bytes committed so far. `payload.len() <= header.payload_size`.
    pub payload: &'a [u8],
    /// Metadata snapshot taken atomically with `payload`'s extent.
    pub header: GrainHeader,
}

impl<'a> GrainData<'a> {
    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    pub fn is_complete(&self) -> bool {
        self.header.committed_slices >= self.header.total_slices
    }

    /// Allocates an owned copy of the payload bytes.
    pub fn to_owned_data(&self) -> OwnedGrainData {
        OwnedGrainData {
            payload: self.payload.to_vec(),
            header: self.header,
        }
    }
}

/// Owned copy of a grain, valid beyond the reader's lifetime.
#[derive(Debug, Clone)]
pub struct OwnedGrainData {
    pub payload: Vec<u8>,
    pub header: GrainHeader,
}
