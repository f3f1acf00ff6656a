// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Discrete media grain handling (video frames and data packets).
//!
//! A grain is one self-contained unit of a discrete flow — a frame or a
//! packet — committed to the ring buffer in one or more slice batches
//! (`SPEC_FULL.md` §3, §4.5).

pub mod data;
pub mod reader;
pub mod write_access;
pub mod writer;

pub use data::{GrainData, OwnedGrainData};
pub use reader::GrainReader;
pub use write_access::GrainWriteAccess;
pub use writer::GrainWriter;
