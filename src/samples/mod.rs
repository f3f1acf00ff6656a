// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Continuous media (audio sample) handling.
//!
//! A continuous flow has no grain boundaries: samples are written and read
//! against a single rolling per-channel ring buffer (`SPEC_FULL.md` §3, §4.6).

pub mod data;
pub mod reader;
pub mod write_access;
pub mod writer;

pub use data::{OwnedSamplesData, SamplesData};
pub use reader::SamplesReader;
pub use write_access::SamplesWriteAccess;
pub use writer::SamplesWriter;
