//! Per-voice playback settings.
//!
//! An `AudioSettings` value is owned by whichever document entity carries it
//! (a hotspot or a global channel) and is copied into the engine on `play` and
//! `update_settings`. Edits go through the typed setters below so every field
//! stays inside its valid range.

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_FADE_IN_SECS, DEFAULT_FADE_OUT_SECS};

/// Volume, stereo position, looping and fade timings for one voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    /// Target loudness in `[0, 1]`.
    pub volume: f64,
    /// Stereo position in `[-1, 1]` (left to right).
    pub pan: f64,
    /// Whether the clip repeats while the voice is active.
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Fade-in duration in seconds.
    #[serde(default = "default_fade_in")]
    pub fade_in: f64,
    /// Fade-out duration in seconds.
    #[serde(default = "default_fade_out")]
    pub fade_out: f64,
}

fn default_fade_in() -> f64 {
    DEFAULT_FADE_IN_SECS
}

fn default_fade_out() -> f64 {
    DEFAULT_FADE_OUT_SECS
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { volume: 1.0, pan: 0.0, looping: false, fade_in: DEFAULT_FADE_IN_SECS, fade_out: DEFAULT_FADE_OUT_SECS }
    }
}

impl AudioSettings {
    /// Settings given to a freshly drawn hotspot.
    #[must_use]
    pub fn hotspot_default() -> Self {
        Self { volume: 1.0, pan: 0.0, looping: false, fade_in: 0.5, fade_out: 0.5 }
    }

    /// Set the target volume, clamped to `[0, 1]`. NaN becomes silence.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
    }

    /// Set the stereo position, clamped to `[-1, 1]`. NaN becomes center.
    pub fn set_pan(&mut self, pan: f64) {
        self.pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Set both fade durations. Negative values clamp to zero; non-finite
    /// values fall back to the engine defaults.
    pub fn set_fade(&mut self, fade_in: f64, fade_out: f64) {
        self.fade_in = sanitize_fade(fade_in, DEFAULT_FADE_IN_SECS);
        self.fade_out = sanitize_fade(fade_out, DEFAULT_FADE_OUT_SECS);
    }

    /// Copy with every field forced into range. Applied by the engine to
    /// values that arrive without going through the setters (deserialized
    /// documents, hand-built literals).
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut out = *self;
        out.set_volume(self.volume);
        out.set_pan(self.pan);
        out.set_fade(self.fade_in, self.fade_out);
        out
    }
}

fn sanitize_fade(secs: f64, default: f64) -> f64 {
    if secs.is_finite() { secs.max(0.0) } else { default }
}
