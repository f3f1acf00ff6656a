// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Integration test for the synchronization group: waiting on a paired
//! video+audio flow for data at a common origin timestamp
//! (`SPEC_FULL.md` §8, scenario S6).

use std::time::{Duration, Instant};

use mxl::config::FlowCreateOptions;
use mxl::instance::{FlowReader, FlowWriter, Instance};
use mxl::sync_group::SyncGroup;
use mxl::time::{Rational, index_to_timestamp, timestamp_to_index};

mod support;
use support::{TestDomain, audio_flow_def, video_flow_def};

#[test]
fn sync_group_waits_for_paired_video_and_audio() {
    let domain = TestDomain::new("s6_sync_group");
    let instance = Instance::open(domain.path()).unwrap();

    let video_rate = Rational::new(30000, 1001);
    let audio_rate = Rational::new(48000, 1);

    let video_id = uuid::Uuid::new_v4();
    let video_descriptor = video_flow_def(video_id, 30000, 1001, 64, 16);
    let video_options = FlowCreateOptions {
        grain_count: Some(10),
        ..Default::default()
    };
    let (_created, mut video_writer_handle) = instance
        .create_flow_writer(&video_descriptor, &video_options)
        .unwrap();

    let audio_id = uuid::Uuid::new_v4();
    let audio_descriptor = audio_flow_def(audio_id, 48000, 1, 2);
    let audio_options = FlowCreateOptions {
        buffer_length: Some(16384),
        ..Default::default()
    };
    let (_created, mut audio_writer_handle) = instance
        .create_flow_writer(&audio_descriptor, &audio_options)
        .unwrap();

    let FlowWriter::Grain(video_writer) = &mut video_writer_handle.writer else {
        panic!("expected grain writer");
    };
    let FlowWriter::Samples(audio_writer) = &mut audio_writer_handle.writer else {
        panic!("expected samples writer");
    };
    let total_slices = video_writer.header_view().discrete_config().slice_count;

    // Commit video grains 0..=5 and the audio samples that fall in each
    // frame's time window (a 1601/1602-cadence split for 30000/1001 against
    // 48000/1, as the spec's S6 describes).
    let mut sample_cursor = 0u64;
    for k in 0..=5u64 {
        let origin_ts = index_to_timestamp(&video_rate, k);
        let access = video_writer.open_grain(k).unwrap();
        access.commit(total_slices, 0, origin_ts).unwrap();

        let next_origin_ts = index_to_timestamp(&video_rate, k + 1);
        let next_sample_index = timestamp_to_index(&audio_rate, next_origin_ts);
        let count = next_sample_index - sample_cursor;
        let mut sample_access = audio_writer.open_samples(sample_cursor, count).unwrap();
        for ch in 0..2u32 {
            let (f1, f2) = sample_access.channel_data_mut(ch).unwrap();
            f1.fill(0xAB);
            f2.fill(0xAB);
        }
        sample_access.commit().unwrap();
        sample_cursor = next_sample_index;
    }

    let video_reader_handle = instance.get_flow_reader(video_id).unwrap();
    let audio_reader_handle = instance.get_flow_reader(audio_id).unwrap();
    let FlowReader::Grain(video_reader) = video_reader_handle.into_reader() else {
        panic!("expected grain reader");
    };
    let FlowReader::Samples(audio_reader) = audio_reader_handle.into_reader() else {
        panic!("expected samples reader");
    };

    let mut group = SyncGroup::new();
    group.add_discrete_reader(video_reader, total_slices);
    group.add_continuous_reader(audio_reader, 1);

    let origin_time_5 = index_to_timestamp(&video_rate, 5);
    let deadline = Instant::now() + Duration::from_millis(50);
    group.wait_for_data_at(origin_time_5, deadline).unwrap();
    assert_eq!(group.len(), 2);
}
