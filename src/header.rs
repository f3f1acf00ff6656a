// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed binary layout of a flow's `data` file and of each grain file.
//!
//! These are POD views over raw shared-memory bytes, not owned structures:
//! every accessor here borrows from a [`crate::mapping::Mapping`] and reads
//! or writes at the fixed offsets mandated by `SPEC_FULL.md` §6. Runtime
//! fields that are concurrently read by readers and written by the writer
//! (`head_index`, `last_write_time`, `last_read_time`, the sync counter) are
//! accessed through atomics; everything else is plain little-endian bytes,
//! matching the "no cross-endian domains" rule in §6.

use std::sync::atomic::{AtomicU32, AtomicU64};

use crate::time::Rational;

/// Total size in bytes of the flow header (`data` file). Fixed per I1.
pub const HEADER_SIZE: usize = 2048;

/// Current on-disk header version understood by this build.
pub const HEADER_VERSION: u32 = 1;

/// Total size in bytes of a single grain file's header region.
pub const GRAIN_HEADER_SIZE: usize = 8192;

/// Offset at which the payload begins within a grain file.
pub const GRAIN_PAYLOAD_OFFSET: usize = GRAIN_HEADER_SIZE;

/// Sentinel grain index meaning "this slot has never been written".
pub const GRAIN_INDEX_NEVER_WRITTEN: u64 = u64::MAX;

const OFF_VERSION: usize = 0x000;
const OFF_STRUCT_SIZE: usize = 0x004;
const OFF_COMMON: usize = 0x008;
const COMMON_LEN: usize = 128;
const OFF_TYPE_CONFIG: usize = OFF_COMMON + COMMON_LEN; // 0x088
const TYPE_CONFIG_LEN: usize = 64;
const OFF_RUNTIME: usize = OFF_TYPE_CONFIG + TYPE_CONFIG_LEN; // 0x0C8
const RUNTIME_LEN: usize = 64;
const OFF_INTERNAL: usize = OFF_RUNTIME + RUNTIME_LEN; // 0x108

const OFF_INODE: usize = OFF_INTERNAL;
const OFF_SYNC_COUNTER: usize = OFF_INTERNAL + 8;

// --- common config sub-offsets (relative to OFF_COMMON) ---
const C_ID: usize = 0;
const C_FORMAT: usize = 16;
const C_RATE_NUM: usize = 20;
const C_RATE_DEN: usize = 28;
const C_COMMIT_HINT: usize = 36;
const C_SYNC_HINT: usize = 40;
const C_PAYLOAD_LOCATION: usize = 44;
const C_DEVICE_INDEX: usize = 48;
const C_FLAGS: usize = 52;

// --- discrete type config sub-offsets (relative to OFF_TYPE_CONFIG) ---
const D_GRAIN_COUNT: usize = 0;
const D_PAYLOAD_SIZE: usize = 8;
const D_SLICE_COUNT: usize = 12;
const D_PLANE_COUNT: usize = 16;
const D_SLICE_SIZES: usize = 20; // [u32; 4], 16 bytes

// --- continuous type config sub-offsets (relative to OFF_TYPE_CONFIG) ---
const A_CHANNEL_COUNT: usize = 0;
const A_SAMPLE_WORD_SIZE: usize = 4;
const A_BUFFER_LENGTH: usize = 8;

/// Media data format tag stored in the common configuration block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DataFormat {
    Unspecified = 0,
    Video = 1,
    Audio = 2,
    Data = 3,
}

impl DataFormat {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => DataFormat::Video,
            2 => DataFormat::Audio,
            3 => DataFormat::Data,
            _ => DataFormat::Unspecified,
        }
    }

    /// Video and generic data flows use the discrete (grain) ring protocol;
    /// audio uses the continuous (sample) protocol.
    pub fn is_discrete(self) -> bool {
        matches!(self, DataFormat::Video | DataFormat::Data)
    }
}

/// Where payload bytes physically live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PayloadLocation {
    HostMemory = 0,
    DeviceMemory = 1,
}

impl PayloadLocation {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => PayloadLocation::DeviceMemory,
            _ => PayloadLocation::HostMemory,
        }
    }
}

/// Borrowed view over the fixed 2048-byte flow header.
///
/// Construction does not itself read or validate anything; call
/// [`HeaderView::validate`] after mapping to enforce I1 (`VersionMismatch`).
pub struct HeaderView<'a> {
    bytes: &'a [u8],
}

/// Mutable borrowed view, used only by the writer during creation and for
/// the runtime region thereafter.
pub struct HeaderViewMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderView<'a> {
    /// Wraps a byte slice that must be at least [`HEADER_SIZE`] long.
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= HEADER_SIZE);
        Self { bytes }
    }

    pub fn version(&self) -> u32 {
        read_u32(self.bytes, OFF_VERSION)
    }

    pub fn struct_size(&self) -> u32 {
        read_u32(self.bytes, OFF_STRUCT_SIZE)
    }

    /// Validates I1: the header reports exactly [`HEADER_SIZE`] and a
    /// version this build understands.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.struct_size() != HEADER_SIZE as u32 || self.version() != HEADER_VERSION {
            return Err(crate::error::Error::VersionMismatch {
                found: self.struct_size(),
                expected: HEADER_SIZE as u32,
            });
        }
        Ok(())
    }

    pub fn common(&self) -> CommonConfig {
        CommonConfig::read(&self.bytes[OFF_COMMON..OFF_COMMON + COMMON_LEN])
    }

    pub fn discrete_config(&self) -> DiscreteConfig {
        DiscreteConfig::read(&self.bytes[OFF_TYPE_CONFIG..OFF_TYPE_CONFIG + TYPE_CONFIG_LEN])
    }

    pub fn continuous_config(&self) -> ContinuousConfig {
        ContinuousConfig::read(&self.bytes[OFF_TYPE_CONFIG..OFF_TYPE_CONFIG + TYPE_CONFIG_LEN])
    }

    pub fn head_index(&self) -> u64 {
        self.runtime_atomic_u64(0).load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn last_write_time(&self) -> u64 {
        self.runtime_atomic_u64(8).load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn last_read_time(&self) -> u64 {
        self.runtime_atomic_u64(16).load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn inode(&self) -> u64 {
        read_u64(self.bytes, OFF_INODE)
    }

    fn runtime_atomic_u64(&self, rel_off: usize) -> &'a AtomicU64 {
        atomic_u64_at(self.bytes, OFF_RUNTIME + rel_off)
    }

    /// The sync counter readers wait on and writers bump.
    pub fn sync_counter(&self) -> &'a AtomicU32 {
        atomic_u32_at(self.bytes, OFF_SYNC_COUNTER)
    }
}

impl<'a> HeaderViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert!(bytes.len() >= HEADER_SIZE);
        Self { bytes }
    }

    pub fn as_view(&self) -> HeaderView<'_> {
        HeaderView::new(self.bytes)
    }

    /// Zero-initializes the whole structure. Called once at creation.
    pub fn zero_init(&mut self) {
        self.bytes[..HEADER_SIZE].fill(0);
    }

    pub fn set_version_and_size(&mut self) {
        write_u32(self.bytes, OFF_VERSION, HEADER_VERSION);
        write_u32(self.bytes, OFF_STRUCT_SIZE, HEADER_SIZE as u32);
    }

    pub fn set_common(&mut self, common: &CommonConfig) {
        common.write(&mut self.bytes[OFF_COMMON..OFF_COMMON + COMMON_LEN]);
    }

    pub fn set_discrete_config(&mut self, cfg: &DiscreteConfig) {
        cfg.write(&mut self.bytes[OFF_TYPE_CONFIG..OFF_TYPE_CONFIG + TYPE_CONFIG_LEN]);
    }

    pub fn set_continuous_config(&mut self, cfg: &ContinuousConfig) {
        cfg.write(&mut self.bytes[OFF_TYPE_CONFIG..OFF_TYPE_CONFIG + TYPE_CONFIG_LEN]);
    }

    pub fn set_inode(&mut self, inode: u64) {
        write_u64(self.bytes, OFF_INODE, inode);
    }

    pub fn as_ref_view(&self) -> HeaderView<'_> {
        HeaderView::new(self.bytes)
    }
}

/// Common configuration fields shared by discrete and continuous flows.
/// Immutable after creation (I2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonConfig {
    pub id: [u8; 16],
    pub format: u32,
    pub rate: Rational,
    pub max_commit_batch_size_hint: u32,
    pub max_sync_batch_size_hint: u32,
    pub payload_location: u32,
    pub device_index: i32,
    pub flags: u32,
}

impl CommonConfig {
    fn read(b: &[u8]) -> Self {
        let mut id = [0u8; 16];
        id.copy_from_slice(&b[C_ID..C_ID + 16]);
        Self {
            id,
            format: read_u32(b, C_FORMAT),
            rate: Rational::new(read_i64(b, C_RATE_NUM), read_i64(b, C_RATE_DEN)),
            max_commit_batch_size_hint: read_u32(b, C_COMMIT_HINT),
            max_sync_batch_size_hint: read_u32(b, C_SYNC_HINT),
            payload_location: read_u32(b, C_PAYLOAD_LOCATION),
            device_index: read_u32(b, C_DEVICE_INDEX) as i32,
            flags: read_u32(b, C_FLAGS),
        }
    }

    fn write(&self, b: &mut [u8]) {
        b[C_ID..C_ID + 16].copy_from_slice(&self.id);
        write_u32(b, C_FORMAT, self.format);
        write_i64(b, C_RATE_NUM, self.rate.numerator);
        write_i64(b, C_RATE_DEN, self.rate.denominator);
        write_u32(b, C_COMMIT_HINT, self.max_commit_batch_size_hint);
        write_u32(b, C_SYNC_HINT, self.max_sync_batch_size_hint);
        write_u32(b, C_PAYLOAD_LOCATION, self.payload_location);
        write_u32(b, C_DEVICE_INDEX, self.device_index as u32);
        write_u32(b, C_FLAGS, self.flags);
    }

    pub fn data_format(&self) -> DataFormat {
        DataFormat::from_u32(self.format)
    }

    pub fn payload_location(&self) -> PayloadLocation {
        PayloadLocation::from_u32(self.payload_location)
    }
}

/// Discrete-flow-specific configuration (slice geometry, grain count).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteConfig {
    pub grain_count: u64,
    pub payload_size: u32,
    pub slice_count: u32,
    pub plane_count: u32,
    pub slice_sizes: [u32; 4],
}

impl DiscreteConfig {
    fn read(b: &[u8]) -> Self {
        let mut slice_sizes = [0u32; 4];
        for (i, s) in slice_sizes.iter_mut().enumerate() {
            *s = read_u32(b, D_SLICE_SIZES + i * 4);
        }
        Self {
            grain_count: read_u64(b, D_GRAIN_COUNT),
            payload_size: read_u32(b, D_PAYLOAD_SIZE),
            slice_count: read_u32(b, D_SLICE_COUNT),
            plane_count: read_u32(b, D_PLANE_COUNT),
            slice_sizes,
        }
    }

    fn write(&self, b: &mut [u8]) {
        write_u64(b, D_GRAIN_COUNT, self.grain_count);
        write_u32(b, D_PAYLOAD_SIZE, self.payload_size);
        write_u32(b, D_SLICE_COUNT, self.slice_count);
        write_u32(b, D_PLANE_COUNT, self.plane_count);
        for (i, s) in self.slice_sizes.iter().enumerate() {
            write_u32(b, D_SLICE_SIZES + i * 4, *s);
        }
    }
}

/// Continuous-flow-specific configuration (channel geometry, buffer length).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuousConfig {
    pub channel_count: u32,
    pub sample_word_size: u32,
    pub buffer_length: u64,
}

impl ContinuousConfig {
    fn read(b: &[u8]) -> Self {
        Self {
            channel_count: read_u32(b, A_CHANNEL_COUNT),
            sample_word_size: read_u32(b, A_SAMPLE_WORD_SIZE),
            buffer_length: read_u64(b, A_BUFFER_LENGTH),
        }
    }

    fn write(&self, b: &mut [u8]) {
        write_u32(b, A_CHANNEL_COUNT, self.channel_count);
        write_u32(b, A_SAMPLE_WORD_SIZE, self.sample_word_size);
        write_u64(b, A_BUFFER_LENGTH, self.buffer_length);
    }
}

// --- Grain header layout ---

const G_INDEX: usize = 0;
const G_PAYLOAD_SIZE: usize = 8;
const G_FLAGS: usize = 12;
const G_TOTAL_SLICES: usize = 16;
const G_COMMITTED_SLICES: usize = 20;
const G_ORIGIN_TIMESTAMP: usize = 24;

/// Borrowed view over a single grain's 8192-byte header.
pub struct GrainHeaderView<'a> {
    bytes: &'a [u8],
}

/// Mutable borrowed view over a single grain's header, used by its writer.
pub struct GrainHeaderViewMut<'a> {
    bytes: &'a mut [u8],
}

/// Plain-data snapshot of a grain header, returned by reader calls so the
/// caller is not holding a borrow into shared memory for metadata alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrainHeader {
    pub index: u64,
    pub payload_size: u32,
    pub flags: u32,
    pub total_slices: u32,
    pub committed_slices: u32,
    pub origin_timestamp: u64,
}

impl<'a> GrainHeaderView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert!(bytes.len() >= GRAIN_HEADER_SIZE);
        Self { bytes }
    }

    pub fn index(&self) -> u64 {
        atomic_u64_at(self.bytes, G_INDEX).load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn snapshot(&self) -> GrainHeader {
        GrainHeader {
            index: self.index(),
            payload_size: read_u32(self.bytes, G_PAYLOAD_SIZE),
            flags: atomic_u32_at(self.bytes, G_FLAGS).load(std::sync::atomic::Ordering::Acquire),
            total_slices: read_u32(self.bytes, G_TOTAL_SLICES),
            committed_slices: atomic_u32_at(self.bytes, G_COMMITTED_SLICES)
                .load(std::sync::atomic::Ordering::Acquire),
            origin_timestamp: read_u64(self.bytes, G_ORIGIN_TIMESTAMP),
        }
    }
}

impl<'a> GrainHeaderViewMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert!(bytes.len() >= GRAIN_HEADER_SIZE);
        Self { bytes }
    }

    pub fn as_view(&self) -> GrainHeaderView<'_> {
        GrainHeaderView::new(self.bytes)
    }

    pub fn zero_init(&mut self) {
        self.bytes[..GRAIN_HEADER_SIZE].fill(0);
        write_u64(self.bytes, G_INDEX, GRAIN_INDEX_NEVER_WRITTEN);
    }

    /// Sets the recorded index and resets `committed_slices` to 0, as
    /// `openGrain` requires (§4.5).
    pub fn begin_open(&mut self, index: u64, total_slices: u32, payload_size: u32) {
        write_u64(self.bytes, G_INDEX, index);
        write_u32(self.bytes, G_PAYLOAD_SIZE, payload_size);
        write_u32(self.bytes, G_TOTAL_SLICES, total_slices);
        atomic_u32_at(self.bytes, G_COMMITTED_SLICES).store(0, std::sync::atomic::Ordering::Relaxed);
        atomic_u32_at(self.bytes, G_FLAGS).store(0, std::sync::atomic::Ordering::Relaxed);
    }

    /// Publishes `flags`, `committed_slices`, and `origin_timestamp` with
    /// release ordering so a reader's matching acquire load of the sync
    /// counter (performed by the caller immediately after) observes them.
    pub fn publish_commit(&mut self, flags: u32, committed_slices: u32, origin_timestamp: u64) {
        write_u64(self.bytes, G_ORIGIN_TIMESTAMP, origin_timestamp);
        atomic_u32_at(self.bytes, G_FLAGS).store(flags, std::sync::atomic::Ordering::Release);
        atomic_u32_at(self.bytes, G_COMMITTED_SLICES)
            .store(committed_slices, std::sync::atomic::Ordering::Release);
    }
}

// --- raw byte helpers ---

fn read_u32(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(b[off..off + 4].try_into().unwrap())
}

fn write_u32(b: &mut [u8], off: usize, v: u32) {
    b[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn read_u64(b: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(b[off..off + 8].try_into().unwrap())
}

fn write_u64(b: &mut [u8], off: usize, v: u64) {
    b[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

fn read_i64(b: &[u8], off: usize) -> i64 {
    i64::from_le_bytes(b[off..off + 8].try_into().unwrap())
}

fn write_i64(b: &mut [u8], off: usize, v: i64) {
    b[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

/// Reinterprets 4 bytes at `off` as an `AtomicU32`.
///
/// SAFETY contract (upheld by all callers): `b` is a mapping of at least
/// [`HEADER_SIZE`]/[`GRAIN_HEADER_SIZE`] bytes backed by a page-aligned
/// `mmap`, so every fixed offset used here is naturally 4- or 8-byte
/// aligned, and the mapping outlives `'a`.
fn atomic_u32_at<'a>(b: &'a [u8], off: usize) -> &'a AtomicU32 {
    let ptr = b[off..off + 4].as_ptr() as *const AtomicU32;
    debug_assert_eq!(ptr as usize % std::mem::align_of::<AtomicU32>(), 0);
    unsafe { &*ptr }
}

fn atomic_u64_at<'a>(b: &'a [u8], off: usize) -> &'a AtomicU64 {
    let ptr = b[off..off + 8].as_ptr() as *const AtomicU64;
    debug_assert_eq!(ptr as usize % std::mem::align_of::<AtomicU64>(), 0);
    unsafe { &*ptr }
}

impl<'a> HeaderView<'a> {
    /// Exposes the runtime head-index atomic for direct store by the
    /// writer (via [`HeaderViewMut`]); readers use [`HeaderView::head_index`].
    pub(crate) fn head_index_atomic(&self) -> &'a AtomicU64 {
        self.runtime_atomic_u64(0)
    }

    pub(crate) fn last_write_time_atomic(&self) -> &'a AtomicU64 {
        self.runtime_atomic_u64(8)
    }

    pub(crate) fn last_read_time_atomic(&self) -> &'a AtomicU64 {
        self.runtime_atomic_u64(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_offsets_fit_budget() {
        assert!(OFF_COMMON + COMMON_LEN <= OFF_TYPE_CONFIG);
        assert!(OFF_TYPE_CONFIG + TYPE_CONFIG_LEN <= OFF_RUNTIME);
        assert!(OFF_RUNTIME + RUNTIME_LEN <= OFF_INTERNAL);
        assert!(OFF_INTERNAL + 8 + 4 <= HEADER_SIZE);
    }

    #[test]
    fn common_config_round_trips() {
        let mut buf = [0u8; HEADER_SIZE];
        let mut hv = HeaderViewMut::new(&mut buf);
        hv.set_version_and_size();
        let cfg = CommonConfig {
            id: [7u8; 16],
            format: DataFormat::Video as u32,
            rate: Rational::new(30000, 1001),
            max_commit_batch_size_hint: 1,
            max_sync_batch_size_hint: 1,
            payload_location: 0,
            device_index: -1,
            flags: 0,
        };
        hv.set_common(&cfg);
        let view = hv.as_ref_view();
        view.validate().unwrap();
        assert_eq!(view.common(), cfg);
    }

    #[test]
    fn grain_header_sentinel_then_open() {
        let mut buf = [0u8; GRAIN_HEADER_SIZE];
        let mut gv = GrainHeaderViewMut::new(&mut buf);
        gv.zero_init();
        assert_eq!(gv.as_view().index(), GRAIN_INDEX_NEVER_WRITTEN);
        gv.begin_open(42, 8, 1024);
        assert_eq!(gv.as_view().index(), 42);
        assert_eq!(gv.as_view().snapshot().committed_slices, 0);
        gv.publish_commit(0, 4, 99);
        assert_eq!(gv.as_view().snapshot().committed_slices, 4);
    }
}
