// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Shared test helpers: an isolated domain directory and minimal flow
//! descriptor JSON builders, mirroring the fixtures used by the teacher
//! crate's own integration tests.

use std::path::{Path, PathBuf};
use std::sync::Once;

use tempfile::TempDir;
use uuid::Uuid;

static LOG_ONCE: Once = Once::new();

fn init_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

/// RAII guard for an isolated domain directory, cleaned up on drop.
#[allow(dead_code)]
pub struct TestDomain {
    dir: TempDir,
}

#[allow(dead_code)]
impl TestDomain {
    pub fn new(test: &str) -> Self {
        init_logging();
        let dir = tempfile::Builder::new()
            .prefix(&format!("mxl_{test}_"))
            .tempdir()
            .expect("failed to create test domain directory");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn path_buf(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

/// Builds a minimal video (discrete) flow descriptor JSON, single luma-only
/// component so `payload_size` and `slice_count` are easy to reason about
/// in tests.
#[allow(dead_code)]
pub fn video_flow_def(id: Uuid, rate_num: i64, rate_den: i64, width: u32, height: u32) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "label": "test-video",
            "format": "urn:x-nmos:format:video",
            "grain_rate": {{"numerator": {rate_num}, "denominator": {rate_den}}},
            "frame_width": {width},
            "frame_height": {height},
            "components": [
                {{"width": {width}, "height": {height}, "bit_depth": 8}}
            ]
        }}"#
    )
}

/// Builds a minimal audio (continuous) flow descriptor JSON.
#[allow(dead_code)]
pub fn audio_flow_def(id: Uuid, rate_num: i64, rate_den: i64, channel_count: u32) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "label": "test-audio",
            "format": "urn:x-nmos:format:audio",
            "sample_rate": {{"numerator": {rate_num}, "denominator": {rate_den}}},
            "channel_count": {channel_count},
            "bit_depth": 32
        }}"#
    )
}
