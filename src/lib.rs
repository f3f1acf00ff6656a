// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # mxl - Media eXchange Layer
//!
//! A native, safe Rust implementation of a shared-memory media exchange
//! substrate for broadcast pipelines: zero-copy, low-latency exchange of
//! video, audio, and data streams between independent processes sharing one
//! domain directory on a memory-backed filesystem (tmpfs).
//!
//! ## Overview
//!
//! A domain is a directory holding one or more flows. Each flow lives in its
//! own `<uuid>.mxl-flow/` subdirectory and is either *discrete* (a ring of
//! grains — video frames or data packets, each committed in one or more
//! slice batches) or *continuous* (a rolling per-channel sample ring, for
//! audio). Writers and readers in different processes map the same files
//! with `mmap` and coordinate entirely through atomics and a futex-backed
//! wait/wake primitive — there is no broker process and no RPC.
//!
//! ### Key Concepts
//!
//! - **Domain** ([`manager::FlowManager`], [`instance::Instance`]): a
//!   directory holding flows, with domain-wide defaults in `options.json`.
//! - **Flow**: a named, typed stream living in its own subdirectory,
//!   described by an opaque `flow_def.json` descriptor.
//! - **Grain** ([`grain`]): one self-contained discrete unit (a frame or
//!   packet), written via [`grain::GrainWriter`] and read via
//!   [`grain::GrainReader`].
//! - **Samples** ([`samples`]): continuous per-channel sample data, written
//!   via [`samples::SamplesWriter`] and read via [`samples::SamplesReader`].
//! - **Synchronization group** ([`sync_group::SyncGroup`]): waits across
//!   several readers (e.g. a video and its paired audio) for data at a
//!   common origin timestamp.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐
//! │ Instance │  (bound to a domain directory)
//! └────┬─────┘
//!      │
//!      ├─► FlowWriterHandle ──► GrainWriter    (video/data)
//!      │                    └─► SamplesWriter  (audio)
//!      │
//!      └─► FlowReaderHandle ──► GrainReader    (video/data)
//!                           └─► SamplesReader  (audio)
//! ```
//!
//! ## Examples
//!
//! ### Creating an instance and writing video grains
//!
//! ```no_run
//! use mxl::config::FlowCreateOptions;
//! use mxl::instance::{FlowWriter, Instance};
//! use std::time::{Duration, Instant};
//!
//! # fn main() -> mxl::error::Result<()> {
//! let instance = Instance::open("/dev/shm/my_domain")?;
//!
//! let flow_def = r#"{"id":"...", "format":"urn:x-nmos:format:video", ...}"#;
//! let options = FlowCreateOptions {
//!     grain_count: Some(6),
//!     ..Default::default()
//! };
//! let (_created, mut handle) = instance.create_flow_writer(flow_def, &options)?;
//!
//! if let FlowWriter::Grain(writer) = &mut handle.writer {
//!     let mut access = writer.open_grain(0)?;
//!     access.payload_mut().fill(0);
//!     let total = access.total_slices();
//!     access.commit(total, 0, 0)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading audio samples
//!
//! ```no_run
//! use mxl::instance::{FlowReader, Instance};
//! use std::time::{Duration, Instant};
//!
//! # fn main() -> mxl::error::Result<()> {
//! let instance = Instance::open("/dev/shm/my_domain")?;
//! let flow_id = uuid::Uuid::nil(); // placeholder
//! let handle = instance.get_flow_reader(flow_id)?;
//!
//! if let FlowReader::Samples(reader) = &handle.reader {
//!     let head = reader.head_index();
//!     let deadline = Instant::now() + Duration::from_secs(1);
//!     let samples = reader.get_samples(head.saturating_sub(479), 480, deadline)?;
//!     for ch in 0..samples.num_of_channels() {
//!         let (_fragment1, _fragment2) = samples.channel_data(ch)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Timing and Synchronization
//!
//! Timestamps are TAI nanoseconds ([`time`]); [`time::timestamp_to_index`] and
//! [`time::index_to_timestamp`] convert between a flow's edit rate and
//! absolute time. Hosts without a native TAI clock approximate it with
//! [`time::TAI_OFFSET_SECONDS`] added to `CLOCK_REALTIME`.
//!
//! ## Thread Safety
//!
//! [`instance::Instance`] is `Send + Sync` and may be shared across threads;
//! it hands out independent reader/writer handles rather than requiring
//! external locking. Individual [`grain::GrainWriter`]/[`samples::SamplesWriter`]
//! handles are not `Sync`: at most one open grain or sample range may exist
//! per handle at a time, enforced by the borrow checker rather than a
//! runtime flag.
//!
//! ## Non-goals
//!
//! This crate implements the shared-memory exchange substrate only. It does
//! not parse or validate the NMOS flow-description schema beyond the fields
//! needed to size a flow, does not provide network transport, and does not
//! implement cross-host clock synchronization.

pub mod config;
pub mod error;
pub mod flow_data;
pub mod flowdef;
pub mod grain;
pub mod header;
pub mod instance;
pub mod layout;
pub mod lock;
pub mod manager;
pub mod mapping;
pub mod samples;
pub mod sync_group;
pub mod time;
pub mod wait;
pub mod watcher;

pub use error::{Error, Result};
pub use flow_data::{ContinuousFlowData, DiscreteFlowData};
pub use grain::{GrainData, GrainReader, GrainWriteAccess, GrainWriter, OwnedGrainData};
pub use header::DataFormat;
pub use instance::{FlowReader, FlowReaderHandle, FlowWriter, FlowWriterHandle, Instance};
pub use manager::FlowManager;
pub use samples::{OwnedSamplesData, SamplesData, SamplesReader, SamplesWriteAccess, SamplesWriter};
pub use sync_group::SyncGroup;
pub use time::Rational;
