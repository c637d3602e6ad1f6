//! Payload catalog.
//!
//! Data shapes that travel as call arguments and return values. The bridge only
//! transports them; what a tempo entry or a chord means is up to the two endpoints.

use crate::codec::RawBytes;
use crate::{compound_struct, versioned_struct};
use serde::{Deserialize, Serialize};

/// Content type identifiers announced by a factory and queried by the host.
pub mod content_type {
    pub const NOTES: i32 = 1;
    pub const TEMPO_ENTRIES: i32 = 2;
    pub const BAR_SIGNATURES: i32 = 3;
    pub const STATIC_TUNING: i32 = 4;
    pub const KEY_SIGNATURES: i32 = 5;
    pub const SHEET_CHORDS: i32 = 6;
}

/// Events of one content type, or `None` when the sender has no such content.
///
/// `Some(vec![])` is a valid answer: content is available but empty (an unset song
/// key reports zero key signatures this way).
pub type ContentEvents<T> = Option<Vec<T>>;

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

compound_struct!(Color { r: 0, g: 1, b: 2 });

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentTimeRange {
    pub start: f64,
    pub duration: f64,
}

compound_struct!(ContentTimeRange {
    start: 0,
    duration: 1
});

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContentTempoEntry {
    pub time_position: f64,
    pub quarter_position: f64,
}

compound_struct!(ContentTempoEntry {
    time_position: 0,
    quarter_position: 1
});

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentBarSignature {
    pub numerator: i32,
    pub denominator: i32,
    pub position: f64,
}

compound_struct!(ContentBarSignature {
    numerator: 0,
    denominator: 1,
    position: 2
});

/// A note event. Durations are in seconds, positions in quarters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentNote {
    pub frequency: f32,
    pub pitch_number: i32,
    pub volume: f32,
    pub start_position: f64,
    pub attack_duration: f64,
    pub note_duration: f64,
    pub signal_duration: f64,
}

compound_struct!(ContentNote {
    frequency: 0,
    pitch_number: 1,
    volume: 2,
    start_position: 3,
    attack_duration: 4,
    note_duration: 5,
    signal_duration: 6,
});

#[derive(Debug, Clone, PartialEq)]
pub struct ContentKeySignature {
    pub root: i32,
    /// Per pitch class, non-zero when the pitch class belongs to the scale.
    pub intervals: [u8; 12],
    pub name: Option<String>,
    pub position: f64,
}

compound_struct!(ContentKeySignature {
    root: 0,
    intervals: 1,
    name: 2,
    position: 3
});

#[derive(Debug, Clone, PartialEq)]
pub struct ContentChord {
    pub root: i32,
    pub bass: i32,
    pub intervals: [u8; 12],
    pub name: Option<String>,
    pub position: f64,
}

compound_struct!(ContentChord {
    root: 0,
    bass: 1,
    intervals: 2,
    name: 3,
    position: 4
});

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentProperties {
    pub struct_size: usize,
    pub name: Option<String>,
}

versioned_struct!(DocumentProperties, min_size = 1, size = 1, {
    name: 0,
} addendum {});

impl DocumentProperties {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            struct_size: Self::STRUCT_SIZE,
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MusicalContextProperties {
    pub struct_size: usize,
    pub name: Option<String>,
    /// Sort position among the document's musical contexts.
    pub order_index: i32,
    pub color: Option<Color>,
}

versioned_struct!(MusicalContextProperties, min_size = 1, size = 3, {
    name: 0,
} addendum {
    order_index: 1 => 0,
    color: 2 => None,
});

impl Default for MusicalContextProperties {
    fn default() -> Self {
        Self {
            struct_size: Self::STRUCT_SIZE,
            name: None,
            order_index: 0,
            color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSourceProperties {
    pub struct_size: usize,
    pub name: Option<String>,
    pub persistent_id: String,
    pub sample_count: i64,
    pub sample_rate: f64,
    pub channel_count: i32,
    pub merits_64_bit_samples: bool,
    /// Opaque channel arrangement, only sent by newer hosts.
    pub channel_arrangement: Option<RawBytes>,
}

versioned_struct!(AudioSourceProperties, min_size = 6, size = 7, {
    name: 0,
    persistent_id: 1,
    sample_count: 2,
    sample_rate: 3,
    channel_count: 4,
    merits_64_bit_samples: 5,
} addendum {
    channel_arrangement: 6 => None,
});

impl AudioSourceProperties {
    pub fn new(persistent_id: impl Into<String>, sample_count: i64, sample_rate: f64) -> Self {
        Self {
            struct_size: Self::STRUCT_SIZE,
            name: None,
            persistent_id: persistent_id.into(),
            sample_count,
            sample_rate,
            channel_count: 1,
            merits_64_bit_samples: false,
            channel_arrangement: None,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.sample_count as f64 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// Sent by the host when initializing a factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceConfiguration {
    pub desired_api_generation: i32,
}

compound_struct!(InterfaceConfiguration {
    desired_api_generation: 0
});

/// Static description of a plug-in factory, as listed during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryDescriptor {
    pub factory_id: String,
    pub plugin_name: String,
    pub manufacturer_name: String,
    #[serde(default)]
    pub information_url: String,
    pub version: String,
    pub lowest_api_generation: i32,
    pub highest_api_generation: i32,
    pub document_archive_id: String,
    #[serde(default)]
    pub compatible_archive_ids: Vec<String>,
    #[serde(default)]
    pub analyzable_content_types: Vec<i32>,
    #[serde(default)]
    pub supported_playback_transformation_flags: i64,
}

compound_struct!(FactoryDescriptor {
    factory_id: 0,
    plugin_name: 1,
    manufacturer_name: 2,
    information_url: 3,
    version: 4,
    lowest_api_generation: 5,
    highest_api_generation: 6,
    document_archive_id: 7,
    compatible_archive_ids: 8,
    analyzable_content_types: 9,
    supported_playback_transformation_flags: 10,
});

impl FactoryDescriptor {
    pub fn supports_api_generation(&self, generation: i32) -> bool {
        (self.lowest_api_generation..=self.highest_api_generation).contains(&generation)
    }

    pub fn can_analyze(&self, content_type: i32) -> bool {
        self.analyzable_content_types.contains(&content_type)
    }
}
