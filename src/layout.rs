// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Deterministic mapping from `(domain, flow id)` to filesystem paths.
//!
//! Every path the crate touches on disk is derived here so the rest of the
//! crate never builds a path by hand. See `SPEC_FULL.md` §6 for the bit-exact
//! layout this module implements.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Suffix appended to a flow's UUID to form its directory name.
pub const FLOW_DIR_SUFFIX: &str = ".mxl-flow";

/// Name of the domain-level options file.
pub const DOMAIN_OPTIONS_FILE: &str = "options.json";

/// Name of the opaque flow descriptor file inside a flow directory.
pub const FLOW_DEF_FILE: &str = "flow_def.json";

/// Name of the fixed-size header file inside a flow directory.
pub const DATA_FILE: &str = "data";

/// Name of the reader-activity touch file inside a flow directory.
pub const ACCESS_FILE: &str = "access";

/// Name of the grains subdirectory for discrete flows.
pub const GRAINS_DIR: &str = "grains";

/// Name of the single channel-buffer file for continuous flows.
pub const CHANNELS_FILE: &str = "channels";

/// Returns the path to a flow's directory: `<domain>/<uuid>.mxl-flow`.
pub fn flow_dir(domain: &Path, flow_id: Uuid) -> PathBuf {
    domain.join(format!("{flow_id}{FLOW_DIR_SUFFIX}"))
}

/// Returns the path to the domain-level options file.
pub fn domain_options_path(domain: &Path) -> PathBuf {
    domain.join(DOMAIN_OPTIONS_FILE)
}

/// Returns the path to a flow's descriptor JSON file.
pub fn flow_def_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join(FLOW_DEF_FILE)
}

/// Returns the path to a flow's fixed-size header file.
pub fn data_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join(DATA_FILE)
}

/// Returns the path to a flow's access touch file.
pub fn access_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join(ACCESS_FILE)
}

/// Returns the path to a discrete flow's grains subdirectory.
pub fn grains_dir(flow_dir: &Path) -> PathBuf {
    flow_dir.join(GRAINS_DIR)
}

/// Returns the path to a single grain file given its ring-buffer slot.
pub fn grain_path(flow_dir: &Path, slot: u64) -> PathBuf {
    grains_dir(flow_dir).join(format!("data.{slot}"))
}

/// Returns the path to a continuous flow's single channel-buffer file.
pub fn channels_path(flow_dir: &Path) -> PathBuf {
    flow_dir.join(CHANNELS_FILE)
}

/// Attempts to recover a flow id from a directory entry name, returning
/// `None` if the name does not end in [`FLOW_DIR_SUFFIX`] or its stem is not
/// a valid canonical UUID.
pub fn parse_flow_dir_name(name: &str) -> Option<Uuid> {
    let stem = name.strip_suffix(FLOW_DIR_SUFFIX)?;
    Uuid::parse_str(stem).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_dir_name() {
        let id = Uuid::new_v4();
        let dir = flow_dir(Path::new("/dev/shm/dom"), id);
        let name = dir.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_flow_dir_name(name), Some(id));
    }

    #[test]
    fn rejects_unrelated_names() {
        assert_eq!(parse_flow_dir_name("not-a-flow"), None);
        assert_eq!(parse_flow_dir_name("not-a-uuid.mxl-flow"), None);
    }
}
