// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle integration tests: create/attach, enumeration, stale detection
//! (P7), and lock-based garbage collection (P9, `SPEC_FULL.md` §8).

use std::time::{Duration, Instant};

use mxl::config::FlowCreateOptions;
use mxl::error::Error;
use mxl::instance::{FlowReader, Instance};

mod support;
use support::{TestDomain, video_flow_def};

/// Creating a flow twice from the same instance attaches the second time
/// rather than erroring, per `createOrOpen*` idempotency (§4.4).
#[test]
fn create_or_open_is_idempotent() {
    let domain = TestDomain::new("idempotent_create");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };

    let (created_first, handle1) = instance.create_flow_writer(&descriptor, &options).unwrap();
    assert!(created_first);
    let (created_second, _handle2) = instance.create_flow_writer(&descriptor, &options).unwrap();
    assert!(!created_second);

    drop(handle1);
}

/// A flow directory is visible to enumeration once created.
#[test]
fn enumerate_lists_created_flows() {
    let domain = TestDomain::new("enumerate");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, _handle) = instance.create_flow_writer(&descriptor, &options).unwrap();

    let manager = mxl::manager::FlowManager::new(domain.path_buf()).unwrap();
    let ids = manager.enumerate().unwrap();
    assert!(ids.contains(&flow_id));
}

/// P7: if a flow's directory is deleted and recreated under a reader's
/// still-open mapping, the next read returns `FlowInvalid` rather than
/// silently reading the new flow's bytes.
#[test]
fn stale_mapping_after_recreate_is_detected() {
    let domain = TestDomain::new("p7_stale");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    let reader_handle = instance.get_flow_reader(flow_id).unwrap();
    let FlowReader::Grain(reader) = &reader_handle.reader else {
        panic!("expected grain reader");
    };

    // Drop the writer (releasing its lock), delete the flow directory by
    // hand, then recreate it under the same id: the data file's inode
    // changes underneath the reader's still-open mapping.
    drop(writer_handle);
    let flow_dir = mxl::layout::flow_dir(domain.path(), flow_id);
    std::fs::remove_dir_all(&flow_dir).unwrap();

    let (_created_again, _writer_handle2) = instance.create_flow_writer(&descriptor, &options).unwrap();

    let err = reader.get_grain_non_blocking(0, 0).unwrap_err();
    assert!(matches!(err, Error::FlowInvalid(_)));
}

/// P9: garbage collection never removes a flow with a live writer (which
/// holds a shared advisory lock on `data`).
#[test]
fn gc_preserves_active_flow() {
    let domain = TestDomain::new("p9_gc_active");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();

    assert!(instance.is_flow_active(flow_id).unwrap());
    let removed = instance.garbage_collect().unwrap();
    assert!(!removed.contains(&flow_id));

    let flow_dir = mxl::layout::flow_dir(domain.path(), flow_id);
    assert!(flow_dir.exists());

    drop(writer_handle);
}

/// Once every writer for a flow has dropped its lock, garbage collection
/// removes the flow directory entirely.
#[test]
fn gc_removes_inactive_flow() {
    let domain = TestDomain::new("gc_inactive");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    drop(writer_handle);

    assert!(!instance.is_flow_active(flow_id).unwrap());
    let removed = instance.garbage_collect().unwrap();
    assert!(removed.contains(&flow_id));

    let flow_dir = mxl::layout::flow_dir(domain.path(), flow_id);
    assert!(!flow_dir.exists());
}

/// A reader for a flow id that was never created fails with `FlowNotFound`.
#[test]
fn reader_on_missing_flow_fails() {
    let domain = TestDomain::new("missing_flow");
    let instance = Instance::open(domain.path()).unwrap();

    let err = instance.get_flow_reader(uuid::Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, Error::FlowNotFound));
}

/// Released handles decrement the instance's live-handle count.
#[test]
fn handle_refcount_tracks_live_handles() {
    let domain = TestDomain::new("refcount");
    let instance = Instance::open(domain.path()).unwrap();
    assert_eq!(instance.live_handle_count(), 0);

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    assert_eq!(instance.live_handle_count(), 1);

    let reader_handle = instance.get_flow_reader(flow_id).unwrap();
    assert_eq!(instance.live_handle_count(), 2);

    instance.release_reader(reader_handle);
    assert_eq!(instance.live_handle_count(), 1);

    instance.release_writer(writer_handle);
    assert_eq!(instance.live_handle_count(), 0);
}

/// Sanity check that `get_grain` deadline expiry surfaces `TooEarly`, not a
/// distinct timeout error, for data that is simply never written (§5).
#[test]
fn deadline_expiry_is_too_early_not_timeout() {
    let domain = TestDomain::new("deadline");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, _writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    let reader_handle = instance.get_flow_reader(flow_id).unwrap();
    let FlowReader::Grain(reader) = &reader_handle.reader else {
        panic!("expected grain reader");
    };

    let deadline = Instant::now() + Duration::from_millis(20);
    let err = reader.get_grain(0, 1, deadline).unwrap_err();
    assert!(matches!(err, Error::TooEarly));
}
