// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Creates, opens, enumerates, and deletes flows on disk.
//!
//! [`FlowManager`] is the only component in the crate that touches the
//! filesystem for lifecycle purposes (`SPEC_FULL.md` §4.4); readers/writers
//! receive already-mapped [`DiscreteFlowData`]/[`ContinuousFlowData`] and
//! never create or delete files themselves.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::flow_data::{self, ContinuousFlowData, DiscreteFlowData, GRAIN_FILE_MIN_SIZE};
use crate::header::{
    CommonConfig, ContinuousConfig, DataFormat, DiscreteConfig, GrainHeaderViewMut, HEADER_SIZE,
    HeaderViewMut, PayloadLocation as HeaderPayloadLocation,
};
use crate::layout;
use crate::lock::LockMode;
use crate::mapping::{Mapping, OpenMode};
use crate::time::Rational;

/// Parameters for creating (or attaching to) a discrete flow.
pub struct DiscreteCreateParams<'a> {
    pub flow_id: Uuid,
    pub descriptor_json: &'a str,
    pub format: DataFormat,
    pub grain_count: u64,
    pub rate: Rational,
    pub payload_size: u32,
    pub slice_count: u32,
    pub slice_sizes: [u32; 4],
    pub commit_hint: u32,
    pub sync_hint: u32,
    pub payload_location: HeaderPayloadLocation,
}

/// Parameters for creating (or attaching to) a continuous flow.
pub struct ContinuousCreateParams<'a> {
    pub flow_id: Uuid,
    pub descriptor_json: &'a str,
    pub channel_count: u32,
    pub rate: Rational,
    pub sample_word_size: u32,
    pub buffer_length: u64,
    pub commit_hint: u32,
    pub sync_hint: u32,
    pub payload_location: HeaderPayloadLocation,
}

/// Creates, opens, enumerates, and removes flows within one domain directory.
pub struct FlowManager {
    domain: PathBuf,
}

impl FlowManager {
    /// Binds to a domain directory. Does not create it — the domain is an
    /// external collaborator per `SPEC_FULL.md` §3.
    pub fn new(domain: impl Into<PathBuf>) -> Result<Self> {
        let domain = domain.into();
        if !domain.is_dir() {
            return Err(Error::FlowInvalid(format!(
                "domain {} is not a directory",
                domain.display()
            )));
        }
        Ok(Self { domain })
    }

    pub fn domain(&self) -> &Path {
        &self.domain
    }

    /// Creates a discrete flow if absent, otherwise attaches to the
    /// existing one as an additional writer. Returns `(created, data)`.
    pub fn create_or_open_discrete_flow(
        &self,
        params: DiscreteCreateParams,
    ) -> Result<(bool, DiscreteFlowData)> {
        let dir = layout::flow_dir(&self.domain, params.flow_id);
        match fs::create_dir(&dir) {
            Ok(()) => {
                self.write_descriptor(&dir, params.descriptor_json)?;
                let data = self.init_discrete_storage(&dir, &params)?;
                Ok((true, data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let data = self.attach_discrete_writer(&dir)?;
                Ok((false, data))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Creates a continuous flow if absent, otherwise attaches to the
    /// existing one as an additional writer. Returns `(created, data)`.
    pub fn create_or_open_continuous_flow(
        &self,
        params: ContinuousCreateParams,
    ) -> Result<(bool, ContinuousFlowData)> {
        let dir = layout::flow_dir(&self.domain, params.flow_id);
        match fs::create_dir(&dir) {
            Ok(()) => {
                self.write_descriptor(&dir, params.descriptor_json)?;
                let data = self.init_continuous_storage(&dir, &params)?;
                Ok((true, data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let data = self.attach_continuous_writer(&dir)?;
                Ok((false, data))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Opens an existing discrete flow as a reader: every mapping is
    /// read-only, no advisory locks are taken (I8).
    pub fn open_discrete_reader(&self, flow_id: Uuid) -> Result<DiscreteFlowData> {
        let dir = layout::flow_dir(&self.domain, flow_id);
        if !dir.is_dir() {
            return Err(Error::FlowNotFound);
        }
        let header = Mapping::open(
            &layout::data_path(&dir),
            OpenMode::ReadOnly,
            LockMode::None,
            HEADER_SIZE,
        )?;
        flow_data::validate_header(&header)?;
        let grain_count = crate::header::HeaderView::new(header.bytes())
            .discrete_config()
            .grain_count;
        let mut grains = Vec::with_capacity(grain_count as usize);
        for slot in 0..grain_count {
            grains.push(Mapping::open(
                &layout::grain_path(&dir, slot),
                OpenMode::ReadOnly,
                LockMode::None,
                GRAIN_FILE_MIN_SIZE,
            )?);
        }
        Ok(DiscreteFlowData::new(dir, header, grains))
    }

    /// Opens an existing continuous flow as a reader.
    pub fn open_continuous_reader(&self, flow_id: Uuid) -> Result<ContinuousFlowData> {
        let dir = layout::flow_dir(&self.domain, flow_id);
        if !dir.is_dir() {
            return Err(Error::FlowNotFound);
        }
        let header = Mapping::open(
            &layout::data_path(&dir),
            OpenMode::ReadOnly,
            LockMode::None,
            HEADER_SIZE,
        )?;
        flow_data::validate_header(&header)?;
        let channels = Mapping::open(
            &layout::channels_path(&dir),
            OpenMode::ReadOnly,
            LockMode::None,
            0,
        )?;
        Ok(ContinuousFlowData::new(dir, header, channels))
    }

    /// Probes the `format` tag of an existing flow without fully opening
    /// it, so callers can dispatch to [`Self::open_discrete_reader`] or
    /// [`Self::open_continuous_reader`] (mirrors the teacher's generic
    /// `FlowReader` -> typed-reader conversion).
    pub fn probe_format(&self, flow_id: Uuid) -> Result<DataFormat> {
        let dir = layout::flow_dir(&self.domain, flow_id);
        if !dir.is_dir() {
            return Err(Error::FlowNotFound);
        }
        let header = Mapping::open(
            &layout::data_path(&dir),
            OpenMode::ReadOnly,
            LockMode::None,
            HEADER_SIZE,
        )?;
        flow_data::validate_header(&header)?;
        Ok(crate::header::HeaderView::new(header.bytes())
            .common()
            .data_format())
    }

    /// Attempts a non-blocking exclusive lock on the flow's `data` file; if
    /// granted (no one else holds it), removes the entire flow directory.
    /// Returns `true` if the flow was removed.
    pub fn garbage_collect_one(&self, flow_id: Uuid) -> Result<bool> {
        let dir = layout::flow_dir(&self.domain, flow_id);
        self.gc_dir(&dir)
    }

    /// Scans the domain and removes every flow directory with no active
    /// advisory lock. Returns the ids removed.
    pub fn garbage_collect_all(&self) -> Result<Vec<Uuid>> {
        let mut removed = Vec::new();
        for id in self.enumerate()? {
            let dir = layout::flow_dir(&self.domain, id);
            if self.gc_dir(&dir)? {
                removed.push(id);
            }
        }
        Ok(removed)
    }

    /// `true` if some process still holds a lock on the flow's `data` file.
    pub fn is_flow_active(&self, flow_id: Uuid) -> Result<bool> {
        let dir = layout::flow_dir(&self.domain, flow_id);
        let path = layout::data_path(&dir);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FlowNotFound
            } else {
                Error::Io(e)
            }
        })?;
        let acquired = crate::lock::try_lock_exclusive(&file).map_err(Error::Io)?;
        if acquired {
            crate::lock::unlock(&file).map_err(Error::Io)?;
        }
        Ok(!acquired)
    }

    /// Lists every flow id present in the domain, deriving it from the
    /// directory-name suffix convention (§4.4).
    pub fn enumerate(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.domain).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            if !entry.file_type().map_err(Error::Io)?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Some(id) = layout::parse_flow_dir_name(name)
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn gc_dir(&self, dir: &Path) -> Result<bool> {
        let path = layout::data_path(dir);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::Io(e)),
        };
        let acquired = crate::lock::try_lock_exclusive(&file).map_err(Error::Io)?;
        if !acquired {
            return Ok(false);
        }
        drop(file);
        fs::remove_dir_all(dir).map_err(Error::Io)?;
        Ok(true)
    }

    fn write_descriptor(&self, dir: &Path, descriptor_json: &str) -> Result<()> {
        let final_path = layout::flow_def_path(dir);
        let tmp_path = dir.join(".flow_def.json.tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(Error::Io)?;
            tmp.write_all(descriptor_json.as_bytes()).map_err(Error::Io)?;
            tmp.sync_all().map_err(Error::Io)?;
        }
        fs::rename(&tmp_path, &final_path).map_err(Error::Io)?;
        if let Ok(dir_handle) = File::open(dir) {
            let _ = dir_handle.sync_all();
        }
        Ok(())
    }

    fn init_discrete_storage(
        &self,
        dir: &Path,
        params: &DiscreteCreateParams,
    ) -> Result<DiscreteFlowData> {
        if params.grain_count == 0 {
            return Err(Error::InvalidArgument(
                "discrete flow grain_count must be positive (I3)".to_string(),
            ));
        }

        let mut header = Mapping::open(
            &layout::data_path(dir),
            OpenMode::CreateExclusive(HEADER_SIZE as u64),
            LockMode::Exclusive,
            HEADER_SIZE,
        )?;
        {
            let mut hv = HeaderViewMut::new(header.bytes_mut());
            hv.zero_init();
            hv.set_version_and_size();
            hv.set_common(&CommonConfig {
                id: *params.flow_id.as_bytes(),
                format: params.format as u32,
                rate: params.rate,
                max_commit_batch_size_hint: params.commit_hint,
                max_sync_batch_size_hint: params.sync_hint,
                payload_location: params.payload_location as u32,
                device_index: -1,
                flags: 0,
            });
            hv.set_discrete_config(&DiscreteConfig {
                grain_count: params.grain_count,
                payload_size: params.payload_size,
                slice_count: params.slice_count,
                plane_count: params.slice_sizes.iter().filter(|s| **s > 0).count() as u32,
                slice_sizes: params.slice_sizes,
            });
        }
        // `inode()` needs an immutable borrow of `header`, which cannot
        // overlap `bytes_mut()`'s mutable borrow above — captured and
        // written back in a second, disjoint borrow.
        let inode = header.inode();
        HeaderViewMut::new(header.bytes_mut()).set_inode(inode);

        // §4.4 step 7: downgrade the creator's exclusive lock to shared so a
        // second writer attaching to this same flow (`attach_discrete_writer`,
        // which takes a `Shared` lock on a distinct fd) does not block forever
        // behind this still-live handle.
        header.downgrade_to_shared()?;

        File::create(layout::access_path(dir)).map_err(Error::Io)?;

        fs::create_dir(layout::grains_dir(dir)).map_err(Error::Io)?;
        let grain_file_size = (GRAIN_FILE_MIN_SIZE as u64) + params.payload_size as u64;
        let mut grains = Vec::with_capacity(params.grain_count as usize);
        for slot in 0..params.grain_count {
            let mut g = Mapping::open(
                &layout::grain_path(dir, slot),
                OpenMode::CreateExclusive(grain_file_size),
                LockMode::Shared,
                GRAIN_FILE_MIN_SIZE,
            )?;
            GrainHeaderViewMut::new(g.bytes_mut()).zero_init();
            grains.push(g);
        }

        Ok(DiscreteFlowData::new(dir.to_path_buf(), header, grains))
    }

    fn init_continuous_storage(
        &self,
        dir: &Path,
        params: &ContinuousCreateParams,
    ) -> Result<ContinuousFlowData> {
        if params.channel_count == 0 {
            return Err(Error::InvalidArgument(
                "continuous flow channel_count must be positive".to_string(),
            ));
        }
        let min_buffer = 2 * params.commit_hint.max(params.sync_hint) as u64;
        if params.buffer_length < min_buffer {
            return Err(Error::InvalidArgument(format!(
                "buffer_length {} must be >= 2*max(commitHint, syncHint) = {} (I4)",
                params.buffer_length, min_buffer
            )));
        }

        let mut header = Mapping::open(
            &layout::data_path(dir),
            OpenMode::CreateExclusive(HEADER_SIZE as u64),
            LockMode::Exclusive,
            HEADER_SIZE,
        )?;
        {
            let mut hv = HeaderViewMut::new(header.bytes_mut());
            hv.zero_init();
            hv.set_version_and_size();
            hv.set_common(&CommonConfig {
                id: *params.flow_id.as_bytes(),
                format: DataFormat::Audio as u32,
                rate: params.rate,
                max_commit_batch_size_hint: params.commit_hint,
                max_sync_batch_size_hint: params.sync_hint,
                payload_location: params.payload_location as u32,
                device_index: -1,
                flags: 0,
            });
            hv.set_continuous_config(&ContinuousConfig {
                channel_count: params.channel_count,
                sample_word_size: params.sample_word_size,
                buffer_length: params.buffer_length,
            });
        }
        let inode = header.inode();
        HeaderViewMut::new(header.bytes_mut()).set_inode(inode);

        // §4.4 step 7: downgrade the creator's exclusive lock to shared so a
        // second writer attaching to this same flow (`attach_continuous_writer`,
        // which takes a `Shared` lock on a distinct fd) does not block forever
        // behind this still-live handle.
        header.downgrade_to_shared()?;

        File::create(layout::access_path(dir)).map_err(Error::Io)?;

        let channels_size = params.channel_count as u64
            * params.buffer_length
            * params.sample_word_size as u64;
        let channels = Mapping::open(
            &layout::channels_path(dir),
            OpenMode::CreateExclusive(channels_size),
            LockMode::Shared,
            0,
        )?;

        Ok(ContinuousFlowData::new(dir.to_path_buf(), header, channels))
    }

    fn attach_discrete_writer(&self, dir: &Path) -> Result<DiscreteFlowData> {
        let header = Mapping::open(
            &layout::data_path(dir),
            OpenMode::ReadWrite,
            LockMode::Shared,
            HEADER_SIZE,
        )?;
        flow_data::validate_header(&header)?;
        let grain_count = crate::header::HeaderView::new(header.bytes())
            .discrete_config()
            .grain_count;
        let mut grains = Vec::with_capacity(grain_count as usize);
        for slot in 0..grain_count {
            grains.push(Mapping::open(
                &layout::grain_path(dir, slot),
                OpenMode::ReadWrite,
                LockMode::Shared,
                GRAIN_FILE_MIN_SIZE,
            )?);
        }
        Ok(DiscreteFlowData::new(dir.to_path_buf(), header, grains))
    }

    fn attach_continuous_writer(&self, dir: &Path) -> Result<ContinuousFlowData> {
        let header = Mapping::open(
            &layout::data_path(dir),
            OpenMode::ReadWrite,
            LockMode::Shared,
            HEADER_SIZE,
        )?;
        flow_data::validate_header(&header)?;
        let channels = Mapping::open(
            &layout::channels_path(dir),
            OpenMode::ReadWrite,
            LockMode::Shared,
            0,
        )?;
        Ok(ContinuousFlowData::new(dir.to_path_buf(), header, channels))
    }
}
