//! Audio device and output context abstraction.
//!
//! The engine never talks to hardware directly. An [`AudioDevice`] opens one
//! shared [`AudioContext`]; the context owns the signal chains (source → gain →
//! pan → destination) and exposes a clock in seconds. Gain changes are
//! expressed as [`GainRamp`]s so the context can apply them sample-accurately
//! while rendering asynchronously to the control calls.

use std::sync::Arc;

use crate::envelope::GainRamp;
use crate::error::MixError;

/// Identifier of one signal chain inside a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub u64);

/// Lifecycle state of an output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Rendering; the clock advances.
    Running,
    /// Created but paused (e.g. by autoplay policy); the clock is frozen.
    Suspended,
    /// Shut down; no further chains can be created.
    Closed,
}

/// Decoded PCM audio shared between the document layer and the context.
#[derive(Debug)]
pub struct Clip {
    /// Human-readable name for logs.
    pub label: String,
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count (1 or 2).
    pub channels: u16,
    /// Interleaved samples in `[-1, 1]`.
    pub samples: Vec<f32>,
}

impl Clip {
    /// Number of frames (samples per channel).
    #[must_use]
    pub fn frames(&self) -> usize {
        if self.channels == 0 { 0 } else { self.samples.len() / usize::from(self.channels) }
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Opaque, cheaply clonable handle to a playable clip.
#[derive(Debug, Clone)]
pub struct ClipHandle(Arc<Clip>);

impl ClipHandle {
    #[must_use]
    pub fn new(clip: Clip) -> Self {
        Self(Arc::new(clip))
    }

    /// Build a handle from interleaved samples.
    #[must_use]
    pub fn from_samples(label: impl Into<String>, sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self::new(Clip { label: label.into(), sample_rate, channels, samples })
    }

    #[must_use]
    pub fn clip(&self) -> &Clip {
        &self.0
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Whether two handles point at the same decoded clip.
    #[must_use]
    pub fn same_clip(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Opens output contexts. Opening may fail when no device is available.
pub trait AudioDevice {
    type Context: AudioContext;

    /// Create a new output context.
    ///
    /// # Errors
    ///
    /// Returns [`MixError::DeviceUnavailable`] when no context can be created.
    fn open(&mut self) -> Result<Self::Context, MixError>;
}

/// A shared output context hosting signal chains.
pub trait AudioContext {
    fn state(&self) -> ContextState;

    /// Resume a suspended context.
    ///
    /// # Errors
    ///
    /// Returns [`MixError::DeviceUnavailable`] if the device refuses to resume
    /// and [`MixError::ContextClosed`] if the context was closed.
    fn resume(&mut self) -> Result<(), MixError>;

    /// Context clock in seconds.
    fn current_time(&self) -> f64;

    /// Build source → gain → pan → destination for `clip` and start the source.
    /// The gain node starts at zero.
    ///
    /// # Errors
    ///
    /// Returns [`MixError::UnsupportedClip`] if the clip cannot be played and
    /// [`MixError::ContextClosed`] on a closed context.
    fn create_chain(&mut self, clip: &ClipHandle, looping: bool) -> Result<ChainId, MixError>;

    /// Replace any in-flight gain automation on `chain` with `ramp`.
    fn schedule_gain(&mut self, chain: ChainId, ramp: GainRamp);

    /// Set the stereo position immediately.
    fn set_pan(&mut self, chain: ChainId, pan: f64);

    /// Change the loop flag of a running source.
    fn set_loop(&mut self, chain: ChainId, looping: bool);

    /// Whether a non-looping source has played to its end.
    fn is_ended(&self, chain: ChainId) -> bool;

    /// Disconnect the chain and release its source.
    fn release_chain(&mut self, chain: ChainId);
}
