// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Owners of a flow's header mapping plus its type-specific payload storage
//! (`SPEC_FULL.md` §2 component 6: "Flow data managers").
//!
//! [`DiscreteFlowData`] and [`ContinuousFlowData`] are the shared innards
//! behind both the reader and writer public types in [`crate::grain`] and
//! [`crate::samples`] — readers and writers differ only in which mapping
//! mode (`ReadOnly` vs `ReadWrite`) they were constructed with and in which
//! operations they expose.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::header::{GRAIN_HEADER_SIZE, HEADER_SIZE, HeaderView};
use crate::layout;
use crate::mapping::Mapping;

/// Payload storage for a discrete flow: one [`Mapping`] per grain slot,
/// indexed by ring-buffer slot (grain index mod grain count).
pub struct DiscreteFlowData {
    flow_dir: PathBuf,
    header: Mapping,
    grains: Vec<Mapping>,
}

impl DiscreteFlowData {
    pub(crate) fn new(flow_dir: PathBuf, header: Mapping, grains: Vec<Mapping>) -> Self {
        Self {
            flow_dir,
            header,
            grains,
        }
    }

    pub fn flow_dir(&self) -> &Path {
        &self.flow_dir
    }

    pub fn header_view(&self) -> HeaderView<'_> {
        HeaderView::new(self.header.bytes())
    }

    pub(crate) fn header_mapping(&self) -> &Mapping {
        &self.header
    }

    pub(crate) fn header_mapping_mut(&mut self) -> &mut Mapping {
        &mut self.header
    }

    pub fn grain_count(&self) -> u64 {
        self.grains.len() as u64
    }

    pub(crate) fn grain(&self, slot: u64) -> &Mapping {
        &self.grains[slot as usize]
    }

    pub(crate) fn grain_mut(&mut self, slot: u64) -> &mut Mapping {
        &mut self.grains[slot as usize]
    }

    /// Borrows the header (immutably, for its atomics/config) and one grain
    /// mapping (mutably) simultaneously. Splitting the borrow this way
    /// (rather than through two `&self`/`&mut self` method calls) lets the
    /// borrow checker see the two fields are disjoint.
    pub(crate) fn header_view_and_grain_mut(&mut self, slot: u64) -> (HeaderView<'_>, &mut Mapping) {
        (
            HeaderView::new(self.header.bytes()),
            &mut self.grains[slot as usize],
        )
    }

    /// I6 staleness check: compares the recorded inode in the header against
    /// the current on-disk inode of the `data` file (not our own cached fd
    /// inode, which would never change even if the file were replaced).
    pub fn check_stale(&self) -> Result<()> {
        check_stale(&self.flow_dir, &self.header)
    }
}

/// Payload storage for a continuous flow: a single [`Mapping`] covering all
/// per-channel ring buffers, concatenated in channel-index order.
pub struct ContinuousFlowData {
    flow_dir: PathBuf,
    header: Mapping,
    channels: Mapping,
}

impl ContinuousFlowData {
    pub(crate) fn new(flow_dir: PathBuf, header: Mapping, channels: Mapping) -> Self {
        Self {
            flow_dir,
            header,
            channels,
        }
    }

    pub fn flow_dir(&self) -> &Path {
        &self.flow_dir
    }

    pub fn header_view(&self) -> HeaderView<'_> {
        HeaderView::new(self.header.bytes())
    }

    pub(crate) fn header_mapping(&self) -> &Mapping {
        &self.header
    }

    pub(crate) fn header_mapping_mut(&mut self) -> &mut Mapping {
        &mut self.header
    }

    pub(crate) fn channels(&self) -> &Mapping {
        &self.channels
    }

    pub(crate) fn channels_mut(&mut self) -> &mut Mapping {
        &mut self.channels
    }

    /// See [`DiscreteFlowData::header_view_and_grain_mut`]; same disjoint
    /// split for the single channels file.
    pub(crate) fn header_view_and_channels_mut(&mut self) -> (HeaderView<'_>, &mut Mapping) {
        (HeaderView::new(self.header.bytes()), &mut self.channels)
    }

    pub fn check_stale(&self) -> Result<()> {
        check_stale(&self.flow_dir, &self.header)
    }
}

/// Opportunistically bumps the access touch file's mtime to the current
/// time, so the domain watcher can reflect reader activity back into the
/// writer's header (`SPEC_FULL.md` §4.9). Errors (e.g. a read-only mount)
/// are swallowed per §4.5 step 5 — the access file may be unwritable to a
/// reader and that must never fail the read.
pub(crate) fn touch_access_file(flow_dir: &Path) {
    use std::fs::OpenOptions;
    use std::time::SystemTime;

    let path = layout::access_path(flow_dir);
    if let Ok(file) = OpenOptions::new().write(true).open(&path) {
        let times = std::fs::FileTimes::new().set_modified(SystemTime::now());
        let _ = file.set_times(times);
    }
}

fn check_stale(flow_dir: &Path, header: &Mapping) -> Result<()> {
    let path = layout::data_path(flow_dir);
    let current = Mapping::current_inode_on_disk(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FlowInvalid("flow directory no longer exists".to_string())
        } else {
            Error::Io(e)
        }
    })?;
    if current != header.inode() {
        return Err(Error::FlowInvalid(
            "data file inode changed; flow was recreated".to_string(),
        ));
    }
    Ok(())
}

/// Asserts a just-opened header mapping satisfies I1 before its data is
/// trusted for anything else.
pub(crate) fn validate_header(header: &Mapping) -> Result<()> {
    debug_assert!(header.bytes().len() >= HEADER_SIZE);
    HeaderView::new(header.bytes()).validate()
}

pub(crate) const GRAIN_FILE_MIN_SIZE: usize = GRAIN_HEADER_SIZE;
