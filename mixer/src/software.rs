//! Software output context.
//!
//! Mixes every live chain into an interleaved stereo `f32` buffer. Sources are
//! resampled to the context rate with linear interpolation, scaled by their
//! gain ramp evaluated per sample, and positioned with the equal-power stereo
//! panning law. The clock only advances while rendering in the running state.

#[cfg(test)]
#[path = "software_test.rs"]
mod software_test;

use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;

use tracing::debug;

use crate::consts::OUTPUT_CHANNELS;
use crate::context::{AudioContext, AudioDevice, ChainId, Clip, ClipHandle, ContextState};
use crate::envelope::GainRamp;
use crate::error::MixError;

/// Opens [`SoftwareContext`]s at a fixed sample rate.
#[derive(Debug, Clone, Copy)]
pub struct SoftwareDevice {
    sample_rate: u32,
    start_suspended: bool,
}

impl SoftwareDevice {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, start_suspended: false }
    }

    /// Device whose contexts start suspended, as browsers do before a user gesture.
    #[must_use]
    pub fn suspended(sample_rate: u32) -> Self {
        Self { sample_rate, start_suspended: true }
    }
}

impl AudioDevice for SoftwareDevice {
    type Context = SoftwareContext;

    fn open(&mut self) -> Result<SoftwareContext, MixError> {
        if self.sample_rate == 0 {
            return Err(MixError::DeviceUnavailable("sample rate must be non-zero".into()));
        }
        let mut ctx = SoftwareContext::new(self.sample_rate);
        if self.start_suspended {
            ctx.state = ContextState::Suspended;
        }
        Ok(ctx)
    }
}

#[derive(Debug)]
struct Chain {
    clip: ClipHandle,
    /// Read position in source frames.
    position: f64,
    gain: GainRamp,
    pan: f64,
    looping: bool,
    ended: bool,
}

/// In-process output context that renders to memory.
#[derive(Debug)]
pub struct SoftwareContext {
    sample_rate: u32,
    state: ContextState,
    frames_rendered: u64,
    next_chain: u64,
    chains: BTreeMap<ChainId, Chain>,
}

impl SoftwareContext {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, state: ContextState::Running, frames_rendered: 0, next_chain: 1, chains: BTreeMap::new() }
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Put the context to sleep; the clock stops until `resume`.
    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
        }
    }

    /// Release every chain and refuse further work.
    pub fn close(&mut self) {
        self.chains.clear();
        self.state = ContextState::Closed;
    }

    /// Number of chains currently connected.
    #[must_use]
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Gain of `chain` at the current clock, if connected.
    #[must_use]
    pub fn chain_gain(&self, chain: ChainId) -> Option<f64> {
        let now = self.current_time();
        self.chains.get(&chain).map(|c| c.gain.value_at(now))
    }

    #[must_use]
    pub fn chain_pan(&self, chain: ChainId) -> Option<f64> {
        self.chains.get(&chain).map(|c| c.pan)
    }

    #[must_use]
    pub fn chain_looping(&self, chain: ChainId) -> Option<bool> {
        self.chains.get(&chain).map(|c| c.looping)
    }

    /// Render `seconds` of audio and discard it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance(&mut self, seconds: f64) {
        if seconds <= 0.0 || !seconds.is_finite() {
            return;
        }
        let frames = (seconds * f64::from(self.sample_rate)).round() as usize;
        let mut scratch = vec![0.0f32; frames * OUTPUT_CHANNELS];
        self.render(&mut scratch);
    }

    /// Mix all chains into `out` (interleaved stereo) and advance the clock.
    ///
    /// A suspended or closed context writes silence and keeps its clock.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        if self.state != ContextState::Running {
            return;
        }

        let frames = out.len() / OUTPUT_CHANNELS;
        let rate = f64::from(self.sample_rate);
        let start_frame = self.frames_rendered;

        for chain in self.chains.values_mut() {
            mix_chain(out, frames, chain, start_frame, rate);
        }

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        self.frames_rendered += frames as u64;
    }
}

#[allow(clippy::cast_possible_truncation)]
fn mix_chain(out: &mut [f32], frames: usize, chain: &mut Chain, start_frame: u64, rate: f64) {
    let clip = chain.clip.clip();
    let src_frames = clip.frames();
    if src_frames == 0 {
        chain.ended = true;
        return;
    }
    let step = f64::from(clip.sample_rate) / rate;
    let len = src_frames as f64;

    for i in 0..frames {
        if chain.ended {
            break;
        }
        let t = (start_frame + i as u64) as f64 / rate;
        let gain = chain.gain.value_at(t);
        let (l, r) = source_frame(clip, chain.position, chain.looping);
        let (l, r) = pan_frame(l, r, clip.channels, chain.pan);

        let idx = i * OUTPUT_CHANNELS;
        out[idx] += (l * gain) as f32;
        out[idx + 1] += (r * gain) as f32;

        chain.position += step;
        if chain.position >= len {
            if chain.looping {
                chain.position %= len;
            } else {
                chain.ended = true;
            }
        }
    }
}

/// Linear-interpolated source frame at fractional `position`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn source_frame(clip: &Clip, position: f64, looping: bool) -> (f64, f64) {
    let frames = clip.frames();
    let i0 = (position.floor() as usize).min(frames - 1);
    let i1 = if i0 + 1 < frames {
        i0 + 1
    } else if looping {
        0
    } else {
        i0
    };
    let frac = position - position.floor();

    let read = |frame: usize| -> (f64, f64) {
        if clip.channels == 1 {
            let v = f64::from(clip.samples[frame]);
            (v, v)
        } else {
            let base = frame * usize::from(clip.channels);
            (f64::from(clip.samples[base]), f64::from(clip.samples[base + 1]))
        }
    };

    let (l0, r0) = read(i0);
    let (l1, r1) = read(i1);
    (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
}

/// Equal-power stereo panning. Mono sources are positioned; stereo sources
/// have the opposite channel folded in as the pan moves away from center.
fn pan_frame(l: f64, r: f64, channels: u16, pan: f64) -> (f64, f64) {
    let pan = pan.clamp(-1.0, 1.0);
    if channels == 1 {
        let x = (pan + 1.0) / 2.0;
        return (l * (x * FRAC_PI_2).cos(), l * (x * FRAC_PI_2).sin());
    }
    if pan <= 0.0 {
        let x = pan + 1.0;
        (l + r * (x * FRAC_PI_2).cos(), r * (x * FRAC_PI_2).sin())
    } else {
        let x = pan;
        (l * (x * FRAC_PI_2).cos(), r + l * (x * FRAC_PI_2).sin())
    }
}

impl AudioContext for SoftwareContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), MixError> {
        match self.state {
            ContextState::Closed => Err(MixError::ContextClosed),
            ContextState::Suspended | ContextState::Running => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    fn create_chain(&mut self, clip: &ClipHandle, looping: bool) -> Result<ChainId, MixError> {
        if self.state == ContextState::Closed {
            return Err(MixError::ContextClosed);
        }
        let c = clip.clip();
        let reason = if c.channels == 0 || c.channels > 2 {
            Some(format!("{} channels (expected 1 or 2)", c.channels))
        } else if c.sample_rate == 0 {
            Some("sample rate is zero".to_string())
        } else if c.frames() == 0 {
            Some("no samples".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(MixError::UnsupportedClip { label: c.label.clone(), reason });
        }

        let id = ChainId(self.next_chain);
        self.next_chain += 1;
        let now = self.current_time();
        self.chains.insert(
            id,
            Chain { clip: clip.clone(), position: 0.0, gain: GainRamp::hold(0.0, now), pan: 0.0, looping, ended: false },
        );
        debug!(chain = id.0, clip = clip.label(), looping, "chain connected");
        Ok(id)
    }

    fn schedule_gain(&mut self, chain: ChainId, ramp: GainRamp) {
        if let Some(c) = self.chains.get_mut(&chain) {
            c.gain = ramp;
        }
    }

    fn set_pan(&mut self, chain: ChainId, pan: f64) {
        if let Some(c) = self.chains.get_mut(&chain) {
            c.pan = pan.clamp(-1.0, 1.0);
        }
    }

    fn set_loop(&mut self, chain: ChainId, looping: bool) {
        if let Some(c) = self.chains.get_mut(&chain) {
            c.looping = looping;
        }
    }

    fn is_ended(&self, chain: ChainId) -> bool {
        self.chains.get(&chain).is_none_or(|c| c.ended)
    }

    fn release_chain(&mut self, chain: ChainId) {
        if self.chains.remove(&chain).is_some() {
            debug!(chain = chain.0, "chain released");
        }
    }
}
