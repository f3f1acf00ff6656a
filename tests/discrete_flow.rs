// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for discrete (grain) flows: single-writer/single-reader
//! video, progressive slice commits, and ring overrun (`SPEC_FULL.md` §8,
//! scenarios S1-S3).

use std::time::{Duration, Instant};

use mxl::config::FlowCreateOptions;
use mxl::error::Error;
use mxl::instance::{FlowReader, FlowWriter, Instance};

mod support;
use support::{TestDomain, video_flow_def};

/// S1: writer commits grains 0..=9 fully, reader reads each back in order.
#[test]
fn single_writer_single_reader_video_roundtrip() {
    let domain = TestDomain::new("s1_video");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 30000, 1001, 1920, 1080);
    let options = FlowCreateOptions {
        grain_count: Some(6),
        ..Default::default()
    };
    let (created, mut writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    assert!(created);
    let reader_handle = instance.get_flow_reader(flow_id).unwrap();

    let FlowWriter::Grain(writer) = &mut writer_handle.writer else {
        panic!("expected grain writer");
    };
    let FlowReader::Grain(reader) = &reader_handle.reader else {
        panic!("expected grain reader");
    };

    let total_slices = writer.header_view().discrete_config().slice_count;
    assert_eq!(total_slices, 1080);

    for k in 0..10u64 {
        let mut access = writer.open_grain(k).unwrap();
        let payload_len = access.payload_size() as usize;
        let pattern = (k as u8).wrapping_mul(7);
        access.payload_mut().fill(pattern);
        access.commit(total_slices, 0, k * 1_000_000).unwrap();

        let deadline = Instant::now() + Duration::from_millis(100);
        let grain = reader.get_grain(k, total_slices, deadline).unwrap();
        assert_eq!(reader.head_index(), k);
        assert!(grain.is_complete());
        assert_eq!(grain.payload.len(), payload_len);
        assert!(grain.payload.iter().all(|&b| b == pattern));
    }
}

/// S2: grain 5 is committed in 8 equal slice batches; a concurrent reader
/// must observe one of the partial-commit slice counts, never less than the
/// threshold it asked for.
#[test]
fn sliced_progressive_commit() {
    let domain = TestDomain::new("s2_sliced");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 1920, 1080);
    let options = FlowCreateOptions {
        grain_count: Some(6),
        ..Default::default()
    };
    let (_created, mut writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    let reader_handle = instance.get_flow_reader(flow_id).unwrap();

    let FlowWriter::Grain(writer) = &mut writer_handle.writer else {
        panic!("expected grain writer");
    };
    let FlowReader::Grain(reader) = &reader_handle.reader else {
        panic!("expected grain reader");
    };

    let total_slices = writer.header_view().discrete_config().slice_count;
    assert_eq!(total_slices, 1080);
    let batch = total_slices / 8;

    let mut access = writer.open_grain(5).unwrap();
    for step in 1..=8u32 {
        access.commit_slices(step * batch, 0, 5_000_000).unwrap();
    }
    drop(access);

    let deadline = Instant::now() + Duration::from_millis(50);
    let grain = reader.get_grain(5, 540, deadline).unwrap();
    let possible = [540u32, 675, 810, 945, 1080];
    assert!(possible.contains(&grain.header.committed_slices));
    assert!(grain.header.committed_slices >= 540);
}

/// S3: a 2-grain ring overrun by four sequential commits must surface
/// `TooLate` to a reader that asks for the overwritten slot.
#[test]
fn overrun_returns_too_late() {
    let domain = TestDomain::new("s3_overrun");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(2),
        ..Default::default()
    };
    let (_created, mut writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    let reader_handle = instance.get_flow_reader(flow_id).unwrap();

    let FlowWriter::Grain(writer) = &mut writer_handle.writer else {
        panic!("expected grain writer");
    };
    let FlowReader::Grain(reader) = &reader_handle.reader else {
        panic!("expected grain reader");
    };

    let total_slices = writer.header_view().discrete_config().slice_count;
    for k in 0..4u64 {
        let access = writer.open_grain(k).unwrap();
        access.commit(total_slices, 0, k).unwrap();
    }

    let deadline = Instant::now() + Duration::from_millis(10);
    let err = reader.get_grain(0, 1, deadline).unwrap_err();
    assert!(matches!(err, Error::TooLate));
}

/// A blocking reader parked on a not-yet-written grain must wake promptly
/// once the writer commits, rather than sleeping to the deadline (P8).
#[test]
fn reader_wakes_promptly_on_commit() {
    let domain = TestDomain::new("wake_promptly");
    let instance = Instance::open(domain.path()).unwrap();

    let flow_id = uuid::Uuid::new_v4();
    let descriptor = video_flow_def(flow_id, 25, 1, 64, 16);
    let options = FlowCreateOptions {
        grain_count: Some(4),
        ..Default::default()
    };
    let (_created, mut writer_handle) = instance.create_flow_writer(&descriptor, &options).unwrap();
    let reader_handle = instance.get_flow_reader(flow_id).unwrap();

    let FlowWriter::Grain(writer) = &mut writer_handle.writer else {
        panic!("expected grain writer");
    };
    let FlowReader::Grain(reader) = &reader_handle.reader else {
        panic!("expected grain reader");
    };
    let total_slices = writer.header_view().discrete_config().slice_count;

    std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(30));
            let access = writer.open_grain(0).unwrap();
            access.commit(total_slices, 0, 0).unwrap();
        });

        let start = Instant::now();
        let deadline = start + Duration::from_secs(5);
        let grain = reader.get_grain(0, total_slices, deadline).unwrap();
        assert!(grain.is_complete());
        assert!(start.elapsed() < Duration::from_secs(1));
    });
}

/// Non-blocking reads return `Ok(None)` rather than blocking when data isn't
/// there yet.
#[test]
fn non_blocking_get_grain_returns_none_when_absent() {
    let domain = TestDomain::new("non_blocking");
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

    let result = reader.get_grain_non_blocking(0, 1).unwrap();
    assert!(result.is_none());
}
