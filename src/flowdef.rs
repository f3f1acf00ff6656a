// SPDX-FileCopyrightText: 2025-2026 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Internal, minimal parsing of the NMOS-ish flow descriptor JSON.
//!
//! The JSON flow-description format itself is out of scope (`SPEC_FULL.md`
//! §1, §4.10): this module extracts only the fields the core needs to size
//! and type a flow (id, format, rate, geometry). Unknown fields are ignored
//! by `serde`'s default behavior; the crate never round-trips or validates
//! the full external schema.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_denominator() -> i64 {
    1
}

/// Rational rate as it appears in flow descriptor JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub numerator: i64,
    #[serde(default = "default_denominator")]
    pub denominator: i64,
}

impl From<Rate> for crate::time::Rational {
    fn from(r: Rate) -> Self {
        crate::time::Rational::new(r.numerator, r.denominator)
    }
}

/// Parsed flow descriptor: the fields the core cares about, plus
/// format-specific geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDef {
    pub id: Uuid,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub details: FlowDefDetails,
}

/// Format-specific geometry, tagged by the descriptor's `format` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum FlowDefDetails {
    #[serde(rename = "urn:x-nmos:format:video")]
    Video(FlowDefVideo),
    #[serde(rename = "urn:x-nmos:format:data")]
    Data(FlowDefData),
    #[serde(rename = "urn:x-nmos:format:audio")]
    Audio(FlowDefAudio),
}

impl FlowDefDetails {
    pub fn rate(&self) -> crate::time::Rational {
        match self {
            FlowDefDetails::Video(v) => v.grain_rate.into(),
            FlowDefDetails::Data(d) => d.grain_rate.into(),
            FlowDefDetails::Audio(a) => a.sample_rate.into(),
        }
    }

    pub fn is_discrete(&self) -> bool {
        !matches!(self, FlowDefDetails::Audio(_))
    }
}

/// Video-specific descriptor fields sufficient to derive grain geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefVideo {
    pub grain_rate: Rate,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Bytes per sample component, used with `components` to size the
    /// payload and per-plane slice lengths.
    #[serde(default)]
    pub components: Vec<VideoComponent>,
}

/// A single video plane/component descriptor (e.g. Y, Cb, Cr).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoComponent {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
}

/// Generic ancillary/data flow descriptor fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefData {
    pub grain_rate: Rate,
    #[serde(default)]
    pub max_payload_size: u32,
}

/// Audio-specific descriptor fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefAudio {
    pub sample_rate: Rate,
    pub channel_count: u32,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u32,
}

fn default_bit_depth() -> u32 {
    32
}

impl FlowDefVideo {
    /// Total payload size implied by this flow's component geometry, one
    /// scan-line-sized slice per row of the tallest component (a common and
    /// simple slice convention; callers may override via explicit
    /// `sliceLengths` at creation).
    pub fn payload_size(&self) -> u32 {
        self.components
            .iter()
            .map(|c| c.width * c.height * c.bit_depth.div_ceil(8))
            .sum()
    }

    /// One slice per scan line of the tallest plane.
    pub fn slice_count(&self) -> u32 {
        self.components.iter().map(|c| c.height).max().unwrap_or(self.frame_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_descriptor() {
        let json = r#"{
            "id": "12345678-1234-1234-1234-123456789abc",
            "label": "cam1",
            "format": "urn:x-nmos:format:video",
            "grain_rate": {"numerator": 30000, "denominator": 1001},
            "frame_width": 1920,
            "frame_height": 1080,
            "components": [
                {"width": 1920, "height": 1080, "bit_depth": 10},
                {"width": 960, "height": 1080, "bit_depth": 10},
                {"width": 960, "height": 1080, "bit_depth": 10}
            ]
        }"#;
        let def: FlowDef = serde_json::from_str(json).unwrap();
        assert!(def.details.is_discrete());
        assert_eq!(def.details.rate(), crate::time::Rational::new(30000, 1001));
        if let FlowDefDetails::Video(v) = &def.details {
            assert_eq!(v.slice_count(), 1080);
        } else {
            panic!("expected video details");
        }
    }

    #[test]
    fn parses_audio_descriptor() {
        let json = r#"{
            "id": "12345678-1234-1234-1234-123456789abc",
            "format": "urn:x-nmos:format:audio",
            "sample_rate": {"numerator": 48000},
            "channel_count": 8,
            "bit_depth": 32
        }"#;
        let def: FlowDef = serde_json::from_str(json).unwrap();
        assert!(!def.details.is_discrete());
    }
}
