//! Replay timestamp fixtures.
//!
//! The replay table exercises the access patterns a scrubbing user
//! produces: back-and-forth jumps, half-second steps, dense tenth-second
//! steps, repeated short bursts around one point and a reverse walk.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Playback pace for the paced replay pass
pub const FRAME_RATE: f64 = 60.0;

#[rustfmt::skip]
pub const REPLAY_TIMESTAMPS: [f64; 55] = [
    // Alternating forward and backward jumps
    0.0, 2.0, 1.0, 3.0, 2.0, 4.0, 3.0, 5.0, 4.0, 6.0, 5.0,
    // Half-second steps
    0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0,
    // Tenth-second steps
    0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0,
    // Repeated bursts
    0.0, 3.0, 3.1, 3.2, 3.3, 3.4, 3.0, 3.1, 3.2, 3.3, 3.4,
    // Reverse walk
    6.5, 6.4, 6.3, 6.2, 6.1, 6.0, 6.5, 6.0, 5.5, 5.0, 4.5,
];

/// Timestamp table replayed after linear playback, with the stalls that
/// simulate a paused viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayFixture {
    pub timestamps: Vec<f64>,
    pub passes: usize,
    /// Pass during which stalls are injected
    pub stall_pass: usize,
    /// Table indices, within `stall_pass`, followed by a stall
    pub stall_indices: Vec<usize>,
    pub stall_secs: f64,
    /// Sleep between retrievals of the paced replay
    pub frame_interval_secs: f64,
}

impl Default for ReplayFixture {
    fn default() -> Self {
        Self {
            timestamps: REPLAY_TIMESTAMPS.to_vec(),
            passes: 2,
            stall_pass: 1,
            stall_indices: vec![0, 10, 20],
            stall_secs: 10.0,
            frame_interval_secs: 1.0 / FRAME_RATE,
        }
    }
}

impl ReplayFixture {
    /// Same access pattern without any sleeping
    pub fn unpaced() -> Self {
        Self {
            stall_secs: 0.0,
            frame_interval_secs: 0.0,
            ..Self::default()
        }
    }

    pub fn stall_after(&self, pass: usize, index: usize) -> Option<Duration> {
        if pass == self.stall_pass && self.stall_indices.contains(&index) {
            non_zero(self.stall_secs)
        } else {
            None
        }
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        non_zero(self.frame_interval_secs)
    }
}

fn non_zero(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Presentation time of frame `index` at the paced replay rate
pub fn paced_timestamp(index: u64) -> f64 {
    index as f64 / FRAME_RATE
}
