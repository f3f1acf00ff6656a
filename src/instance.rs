// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Instance: the top-level handle binding a domain directory, reference-
//! counted flow writer/reader handles, garbage collection, and the domain
//! watcher (`SPEC_FULL.md` §4.8, §4.9).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use uuid::Uuid;

use crate::config::{DomainOptions, FlowCreateOptions};
use crate::error::{Error, Result};
use crate::flowdef::{FlowDef, FlowDefDetails, FlowDefVideo};
use crate::grain::{GrainReader, GrainWriter};
use crate::header::DataFormat;
use crate::layout;
use crate::manager::{ContinuousCreateParams, DiscreteCreateParams, FlowManager};
use crate::samples::{SamplesReader, SamplesWriter};
use crate::watcher::DomainWatcher;

/// A writer handle for either flow kind, dispatched by format at creation
/// time. Two concrete types behind one small enum, per the "polymorphic
/// reader/writer" design note, rather than a virtual hierarchy.
pub enum FlowWriter {
    Grain(GrainWriter),
    Samples(SamplesWriter),
}

/// A reader handle for either flow kind.
pub enum FlowReader {
    Grain(GrainReader),
    Samples(SamplesReader),
}

/// Reference-counted writer handle returned by [`Instance::create_flow_writer`].
///
/// Each handle owns an independent set of mappings rather than sharing one
/// through interior mutability — the files are mapped `MAP_SHARED`, so
/// distinct handles still observe the same bytes; only the bookkeeping of
/// "how many live handles this instance has outstanding" is centralized,
/// through `live_handles`.
pub struct FlowWriterHandle {
    pub flow_id: Uuid,
    pub writer: FlowWriter,
    live_handles: Arc<AtomicI64>,
}

impl Drop for FlowWriterHandle {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::AcqRel);
    }
}

impl FlowWriterHandle {
    /// Consumes the handle, releasing its live-count slot exactly as
    /// dropping it would, and returns the inner writer by value (e.g. to
    /// hand it to a long-lived owner after the handle bookkeeping is done).
    pub fn into_writer(self) -> FlowWriter {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.live_handles.fetch_sub(1, Ordering::AcqRel);
        // SAFETY: `this` is never read from or dropped again after this point.
        unsafe { std::ptr::read(&this.writer) }
    }
}

/// Reference-counted reader handle returned by [`Instance::get_flow_reader`].
pub struct FlowReaderHandle {
    pub flow_id: Uuid,
    pub reader: FlowReader,
    live_handles: Arc<AtomicI64>,
}

impl Drop for FlowReaderHandle {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::AcqRel);
    }
}

impl FlowReaderHandle {
    /// Consumes the handle, releasing its live-count slot exactly as
    /// dropping it would, and returns the inner reader by value (e.g. to
    /// hand an owned reader into a [`crate::sync_group::SyncGroup`]).
    pub fn into_reader(self) -> FlowReader {
        let mut this = std::mem::ManuallyDrop::new(self);
        this.live_handles.fetch_sub(1, Ordering::AcqRel);
        // SAFETY: `this` is never read from or dropped again after this point.
        unsafe { std::ptr::read(&this.reader) }
    }
}

/// Root handle for one domain: creates/opens flows, tracks live handle
/// counts, runs garbage collection, and owns the domain watcher.
pub struct Instance {
    manager: FlowManager,
    domain_options: DomainOptions,
    watcher: DomainWatcher,
    live_handles: Arc<AtomicI64>,
}

impl Instance {
    /// Binds to `domain`, loading `options.json` if present and running one
    /// garbage-collection pass immediately (§4.8: "the instance runs garbage
    /// collection on construction").
    pub fn open(domain: impl Into<PathBuf>) -> Result<Self> {
        let domain = domain.into();
        let domain_options = DomainOptions::load(&domain)?;
        let manager = FlowManager::new(domain)?;
        let instance = Self {
            manager,
            domain_options,
            watcher: DomainWatcher::new(),
            live_handles: Arc::new(AtomicI64::new(0)),
        };
        instance.garbage_collect()?;
        Ok(instance)
    }

    pub fn domain(&self) -> &Path {
        self.manager.domain()
    }

    /// Number of writer/reader handles created by this instance and not yet
    /// released or dropped.
    pub fn live_handle_count(&self) -> i64 {
        self.live_handles.load(Ordering::Acquire)
    }

    /// Parses `descriptor_json`, creates the flow if absent (or attaches as
    /// an additional writer if it already exists), and registers it with
    /// the domain watcher. Returns `(created, handle)`.
    pub fn create_flow_writer(
        &self,
        descriptor_json: &str,
        options: &FlowCreateOptions,
    ) -> Result<(bool, FlowWriterHandle)> {
        let def: FlowDef = serde_json::from_str(descriptor_json).map_err(Error::Descriptor)?;
        let rate = def.details.rate();
        let commit_hint = options.commit_hint(&self.domain_options);
        let sync_hint = options.sync_hint(&self.domain_options);
        let payload_location = options.payload_location(&self.domain_options).into();

        let (created, writer) = if def.details.is_discrete() {
            let (payload_size, slice_count, slice_sizes) = discrete_geometry(&def)?;
            let grain_count = self.resolve_grain_count(options, &rate)?;
            let params = DiscreteCreateParams {
                flow_id: def.id,
                descriptor_json,
                format: discrete_format(&def),
                grain_count,
                rate,
                payload_size,
                slice_count,
                slice_sizes,
                commit_hint,
                sync_hint,
                payload_location,
            };
            let (created, data) = self.manager.create_or_open_discrete_flow(params)?;
            (created, FlowWriter::Grain(GrainWriter::new(data)))
        } else {
            let channel_count = continuous_channel_count(&def)?;
            let sample_word_size = continuous_sample_word_size(&def)?;
            let buffer_length = self.resolve_buffer_length(options, &rate)?;
            let params = ContinuousCreateParams {
                flow_id: def.id,
                descriptor_json,
                channel_count,
                rate,
                sample_word_size,
                buffer_length,
                commit_hint,
                sync_hint,
                payload_location,
            };
            let (created, data) = self.manager.create_or_open_continuous_flow(params)?;
            (created, FlowWriter::Samples(SamplesWriter::new(data)))
        };

        self.watcher
            .register(def.id, layout::flow_dir(self.manager.domain(), def.id));
        self.live_handles.fetch_add(1, Ordering::AcqRel);
        Ok((
            created,
            FlowWriterHandle {
                flow_id: def.id,
                writer,
                live_handles: Arc::clone(&self.live_handles),
            },
        ))
    }

    /// Opens a reader for an existing flow, probing its format to dispatch
    /// to the discrete or continuous path. Multiple calls with the same id
    /// return distinct handles (§4.8).
    pub fn get_flow_reader(&self, flow_id: Uuid) -> Result<FlowReaderHandle> {
        let format = self.manager.probe_format(flow_id)?;
        let reader = if format.is_discrete() {
            FlowReader::Grain(GrainReader::new(self.manager.open_discrete_reader(flow_id)?))
        } else {
            FlowReader::Samples(SamplesReader::new(
                self.manager.open_continuous_reader(flow_id)?,
            ))
        };
        self.live_handles.fetch_add(1, Ordering::AcqRel);
        Ok(FlowReaderHandle {
            flow_id,
            reader,
            live_handles: Arc::clone(&self.live_handles),
        })
    }

    /// Explicitly releases a writer handle (equivalent to letting it drop,
    /// but named to match §4.8's `releaseWriter`); also stops watching the
    /// flow's access file.
    pub fn release_writer(&self, handle: FlowWriterHandle) {
        self.watcher.unregister(handle.flow_id);
        drop(handle);
    }

    /// Explicitly releases a reader handle.
    pub fn release_reader(&self, handle: FlowReaderHandle) {
        drop(handle);
    }

    /// Scans the domain and removes every flow whose `data` file is not
    /// held by any advisory lock. Also runs on construction.
    pub fn garbage_collect(&self) -> Result<Vec<Uuid>> {
        self.manager.garbage_collect_all()
    }

    pub fn is_flow_active(&self, flow_id: Uuid) -> Result<bool> {
        self.manager.is_flow_active(flow_id)
    }

    fn resolve_grain_count(&self, options: &FlowCreateOptions, rate: &crate::time::Rational) -> Result<u64> {
        if let Some(n) = options.grain_count {
            return Ok(n);
        }
        let history = self.domain_options.history_duration_ns.ok_or_else(|| {
            Error::InvalidArgument(
                "grain_count must be given explicitly or via domain history_duration_ns".to_string(),
            )
        })?;
        let period = rate.period_ns().ok_or_else(|| {
            Error::InvalidArgument("flow rate is invalid; cannot derive grain_count".to_string())
        })?;
        Ok(crate::config::derive_grain_count(history, period))
    }

    fn resolve_buffer_length(&self, options: &FlowCreateOptions, rate: &crate::time::Rational) -> Result<u64> {
        if let Some(n) = options.buffer_length {
            return Ok(n);
        }
        let history = self.domain_options.history_duration_ns.ok_or_else(|| {
            Error::InvalidArgument(
                "buffer_length must be given explicitly or via domain history_duration_ns".to_string(),
            )
        })?;
        Ok(crate::config::derive_buffer_length(history, rate))
    }
}

fn discrete_format(def: &FlowDef) -> DataFormat {
    match &def.details {
        FlowDefDetails::Video(_) => DataFormat::Video,
        FlowDefDetails::Data(_) => DataFormat::Data,
        FlowDefDetails::Audio(_) => DataFormat::Audio,
    }
}

fn discrete_geometry(def: &FlowDef) -> Result<(u32, u32, [u32; 4])> {
    match &def.details {
        FlowDefDetails::Video(v) => Ok((v.payload_size(), v.slice_count(), slice_sizes_for(v))),
        FlowDefDetails::Data(d) => Ok((d.max_payload_size, 1, [d.max_payload_size, 0, 0, 0])),
        FlowDefDetails::Audio(_) => Err(Error::InvalidArgument(
            "audio flows use the continuous path".to_string(),
        )),
    }
}

fn slice_sizes_for(v: &FlowDefVideo) -> [u32; 4] {
    let mut sizes = [0u32; 4];
    for (i, c) in v.components.iter().take(4).enumerate() {
        sizes[i] = c.width * c.bit_depth.div_ceil(8);
    }
    sizes
}

fn continuous_channel_count(def: &FlowDef) -> Result<u32> {
    match &def.details {
        FlowDefDetails::Audio(a) => Ok(a.channel_count),
        _ => Err(Error::InvalidArgument("not an audio flow".to_string())),
    }
}

fn continuous_sample_word_size(def: &FlowDef) -> Result<u32> {
    match &def.details {
        FlowDefDetails::Audio(a) => Ok(a.bit_depth.div_ceil(8)),
        _ => Err(Error::InvalidArgument("not an audio flow".to_string())),
    }
}
