//! Voice table and per-voice state machine.
//!
//! DESIGN
//! ======
//! Every voice lives in one table keyed by [`VoiceId`]; its [`VoiceState`] is
//! the single source of truth for where it is in its lifecycle:
//!
//! ```text
//! (absent) --play--> Playing --stop--> FadingOut --timer--> (absent)
//!                       ^                  |
//!                       +-----play---------+   (revival)
//! ```
//!
//! A `FadingOut` voice carries the key of its pending teardown in the shared
//! timer wheel. Leaving `FadingOut` is only possible by cancelling that key,
//! so a revived voice can never be released by a stale timer.
//!
//! Revival only applies to a fading voice that is still bound to the same
//! clip handle and whose source has not ended. Otherwise `play` cancels the
//! teardown, releases the old chain, and starts a fresh voice.
//!
//! All calls run on the control thread in call order. Ramps and teardown are
//! expressed in context time and complete later, while the context renders.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::consts::{SETTINGS_RAMP_SECS, STOP_ALL_FADE_SECS, TEARDOWN_MARGIN_SECS};
use crate::context::{AudioContext, AudioDevice, ChainId, ClipHandle, ContextState};
use crate::envelope::GainRamp;
use crate::error::MixError;
use crate::settings::AudioSettings;
use crate::timer::{TimerKey, TimerWheel};

// =============================================================================
// TYPES
// =============================================================================

/// Stable name of a voice (a hotspot or channel id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(String);

impl VoiceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for VoiceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Uuid> for VoiceId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a live voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Audible (possibly still fading in). Accepts parameter updates.
    Playing,
    /// Ramping to silence; released when `teardown` fires.
    FadingOut { teardown: TimerKey },
}

/// Result of [`Mixer::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new voice was created and is fading in.
    Started,
    /// A fading voice was brought back; its teardown was cancelled.
    Revived,
    /// The voice was already playing; nothing changed.
    AlreadyPlaying,
}

/// Result of [`Mixer::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The voice started its fade-out.
    FadingOut,
    /// No playing voice with that id; nothing changed.
    Ignored,
}

/// Read-only view of a voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSnapshot {
    pub id: VoiceId,
    pub state: VoiceState,
    /// Loudness at the current context time.
    pub gain_level: f64,
    /// Loudness the current ramp is heading to.
    pub gain_target: f64,
    pub pan_level: f64,
    pub looping: bool,
    /// Fade-out the next `stop` will use.
    pub pending_fade_out: f64,
}

#[derive(Debug)]
struct Voice {
    chain: ChainId,
    clip: ClipHandle,
    gain: GainRamp,
    pan: f64,
    looping: bool,
    fade_out: f64,
    state: VoiceState,
}

/// The control surface the hotspot layer drives.
pub trait MixControl {
    /// Start or revive the voice `id`.
    ///
    /// # Errors
    ///
    /// Returns [`MixError`] when no output context is available or the clip
    /// cannot be attached. The engine state is unchanged in that case.
    fn play(&mut self, id: &VoiceId, clip: &ClipHandle, settings: &AudioSettings) -> Result<PlayOutcome, MixError>;

    /// Fade out the voice `id` using its own fade-out duration.
    fn stop(&mut self, id: &VoiceId) -> StopOutcome;

    /// Fade out every voice with the short fixed fade.
    fn stop_all(&mut self);

    /// Apply new settings to a playing voice. Returns whether anything changed.
    fn update_settings(&mut self, id: &VoiceId, settings: &AudioSettings) -> bool;
}

// =============================================================================
// MIXER
// =============================================================================

/// Mix engine over one lazily opened output context.
pub struct Mixer<D: AudioDevice> {
    device: D,
    context: Option<D::Context>,
    voices: BTreeMap<VoiceId, Voice>,
    teardown: TimerWheel<VoiceId>,
}

impl<D: AudioDevice> Mixer<D> {
    /// Create an engine. No context is opened until the first `play`.
    #[must_use]
    pub fn new(device: D) -> Self {
        Self { device, context: None, voices: BTreeMap::new(), teardown: TimerWheel::default() }
    }

    // --- Context lifecycle ---

    /// Open the context if needed and resume it if suspended.
    ///
    /// # Errors
    ///
    /// Returns [`MixError::DeviceUnavailable`] (or the context's own error)
    /// when the device cannot provide a running context.
    pub fn ensure_context(&mut self) -> Result<(), MixError> {
        if self.context.as_ref().is_some_and(|c| c.state() == ContextState::Closed) {
            warn!(voices = self.voices.len(), "audio context closed underneath engine; reopening");
            self.context = None;
            self.voices.clear();
            self.teardown = TimerWheel::default();
        }

        if self.context.is_none() {
            let ctx = self.device.open().inspect_err(|e| warn!(error = %e, "failed to open audio context"))?;
            info!("audio context opened");
            self.context = Some(ctx);
        }

        let Some(ctx) = self.context.as_mut() else {
            return Err(MixError::DeviceUnavailable("no audio context".into()));
        };
        if ctx.state() == ContextState::Suspended {
            ctx.resume().inspect_err(|e| warn!(error = %e, "failed to resume audio context"))?;
            debug!("audio context resumed");
        }
        Ok(())
    }

    // --- Voice control ---

    /// Start a voice, revive a fading one, or do nothing if it is playing.
    ///
    /// # Errors
    ///
    /// See [`MixControl::play`].
    pub fn play(&mut self, id: &VoiceId, clip: &ClipHandle, settings: &AudioSettings) -> Result<PlayOutcome, MixError> {
        let settings = settings.sanitized();
        self.ensure_context()?;
        let Some(ctx) = self.context.as_mut() else {
            return Err(MixError::DeviceUnavailable("no audio context".into()));
        };
        let now = ctx.current_time();

        if let Some(voice) = self.voices.get(id) {
            let ended = ctx.is_ended(voice.chain) && (!voice.looping || voice.state != VoiceState::Playing);
            let fading = matches!(voice.state, VoiceState::FadingOut { .. });
            let rebound = fading && !voice.clip.same_clip(clip);
            if ended || rebound {
                debug!(voice = %id, ended, rebound, "replacing stale voice");
                if let VoiceState::FadingOut { teardown } = voice.state {
                    self.teardown.cancel(teardown);
                }
                ctx.release_chain(voice.chain);
                self.voices.remove(id);
            }
        }

        if let Some(voice) = self.voices.get_mut(id) {
            let VoiceState::FadingOut { teardown } = voice.state else {
                debug!(voice = %id, "play ignored; already playing");
                return Ok(PlayOutcome::AlreadyPlaying);
            };
            self.teardown.cancel(teardown);
            let level = voice.gain.value_at(now);
            voice.gain = GainRamp::linear(level, settings.volume, now, settings.fade_in);
            voice.pan = settings.pan;
            voice.looping = settings.looping;
            voice.fade_out = settings.fade_out;
            voice.state = VoiceState::Playing;
            ctx.schedule_gain(voice.chain, voice.gain);
            ctx.set_pan(voice.chain, voice.pan);
            ctx.set_loop(voice.chain, voice.looping);
            debug!(voice = %id, from = level, to = settings.volume, fade_in = settings.fade_in, "voice revived");
            return Ok(PlayOutcome::Revived);
        }

        let chain = ctx.create_chain(clip, settings.looping)?;
        let gain = GainRamp::linear(0.0, settings.volume, now, settings.fade_in);
        ctx.schedule_gain(chain, gain);
        ctx.set_pan(chain, settings.pan);
        self.voices.insert(
            id.clone(),
            Voice {
                chain,
                clip: clip.clone(),
                gain,
                pan: settings.pan,
                looping: settings.looping,
                fade_out: settings.fade_out,
                state: VoiceState::Playing,
            },
        );
        debug!(voice = %id, clip = clip.label(), volume = settings.volume, fade_in = settings.fade_in, "voice started");
        Ok(PlayOutcome::Started)
    }

    /// Fade a playing voice out over its remembered fade-out duration.
    pub fn stop(&mut self, id: &VoiceId) -> StopOutcome {
        let Some(ctx) = self.context.as_mut() else {
            return StopOutcome::Ignored;
        };
        let Some(voice) = self.voices.get_mut(id) else {
            debug!(voice = %id, "stop ignored; unknown voice");
            return StopOutcome::Ignored;
        };
        if voice.state != VoiceState::Playing {
            debug!(voice = %id, "stop ignored; already fading out");
            return StopOutcome::Ignored;
        }

        let now = ctx.current_time();
        let duration = voice.fade_out;
        fade_to_silence(ctx, &mut self.teardown, id, voice, now, duration);
        debug!(voice = %id, fade_out = duration, "voice fading out");
        StopOutcome::FadingOut
    }

    /// Fade every voice to silence over [`STOP_ALL_FADE_SECS`].
    ///
    /// Voices already fading out with a longer remaining fade are shortened.
    pub fn stop_all(&mut self) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let now = ctx.current_time();
        let mut affected = 0usize;

        for (id, voice) in &mut self.voices {
            let shorten = match voice.state {
                VoiceState::Playing => true,
                VoiceState::FadingOut { .. } => voice.gain.end > now + STOP_ALL_FADE_SECS,
            };
            if shorten {
                fade_to_silence(ctx, &mut self.teardown, id, voice, now, STOP_ALL_FADE_SECS);
                affected += 1;
            }
        }
        debug!(affected, total = self.voices.len(), "stop all");
    }

    /// Update a playing voice: ramp to the new volume over
    /// [`SETTINGS_RAMP_SECS`], set pan and loop immediately, and remember the
    /// fade-out for the next `stop`. Ignored while fading out.
    pub fn update_settings(&mut self, id: &VoiceId, settings: &AudioSettings) -> bool {
        let settings = settings.sanitized();
        let Some(ctx) = self.context.as_mut() else {
            return false;
        };
        let Some(voice) = self.voices.get_mut(id) else {
            return false;
        };
        if voice.state != VoiceState::Playing {
            debug!(voice = %id, "settings update ignored while fading out");
            return false;
        }

        let now = ctx.current_time();
        let level = voice.gain.value_at(now);
        voice.gain = GainRamp::linear(level, settings.volume, now, SETTINGS_RAMP_SECS);
        voice.pan = settings.pan;
        voice.looping = settings.looping;
        voice.fade_out = settings.fade_out;
        ctx.schedule_gain(voice.chain, voice.gain);
        ctx.set_pan(voice.chain, voice.pan);
        ctx.set_loop(voice.chain, voice.looping);
        debug!(voice = %id, volume = settings.volume, pan = settings.pan, looping = settings.looping, "voice updated");
        true
    }

    /// Release voices whose teardown is due and voices whose non-looping
    /// source has ended. Returns how many voices were released.
    pub fn tick(&mut self) -> usize {
        let Some(ctx) = self.context.as_mut() else {
            return 0;
        };
        let now = ctx.current_time();
        let mut released = 0;

        for id in self.teardown.expire(now) {
            let due = self.voices.get(&id).is_some_and(|v| matches!(v.state, VoiceState::FadingOut { .. }));
            if !due {
                warn!(voice = %id, "teardown fired for a voice that is not fading out");
                continue;
            }
            if let Some(voice) = self.voices.remove(&id) {
                ctx.release_chain(voice.chain);
                released += 1;
                debug!(voice = %id, "voice released");
            }
        }

        let ended: Vec<VoiceId> = self
            .voices
            .iter()
            .filter(|(_, v)| v.state == VoiceState::Playing && !v.looping && ctx.is_ended(v.chain))
            .map(|(id, _)| id.clone())
            .collect();
        for id in ended {
            if let Some(voice) = self.voices.remove(&id) {
                ctx.release_chain(voice.chain);
                released += 1;
                debug!(voice = %id, "voice finished");
            }
        }
        released
    }

    /// Release every voice immediately. The context stays open.
    pub fn shutdown(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            for voice in self.voices.values() {
                ctx.release_chain(voice.chain);
            }
        }
        if !self.voices.is_empty() {
            info!(voices = self.voices.len(), "mixer shut down");
        }
        self.voices.clear();
        self.teardown = TimerWheel::default();
    }

    // --- Queries ---

    #[must_use]
    pub fn voice(&self, id: &VoiceId) -> Option<VoiceSnapshot> {
        let voice = self.voices.get(id)?;
        let now = self.now().unwrap_or(0.0);
        Some(VoiceSnapshot {
            id: id.clone(),
            state: voice.state,
            gain_level: voice.gain.value_at(now),
            gain_target: voice.gain.to,
            pan_level: voice.pan,
            looping: voice.looping,
            pending_fade_out: voice.fade_out,
        })
    }

    /// Current loudness of `id`, if it exists.
    #[must_use]
    pub fn loudness(&self, id: &VoiceId) -> Option<f64> {
        let now = self.now()?;
        self.voices.get(id).map(|v| v.gain.value_at(now))
    }

    #[must_use]
    pub fn is_playing(&self, id: &VoiceId) -> bool {
        self.voices.get(id).is_some_and(|v| v.state == VoiceState::Playing)
    }

    /// Ids of every live voice, in id order.
    #[must_use]
    pub fn voice_ids(&self) -> Vec<VoiceId> {
        self.voices.keys().cloned().collect()
    }

    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Number of teardowns waiting in the timer wheel.
    #[must_use]
    pub fn pending_teardowns(&self) -> usize {
        self.teardown.len()
    }

    /// Context clock, if a context is open.
    #[must_use]
    pub fn now(&self) -> Option<f64> {
        self.context.as_ref().map(AudioContext::current_time)
    }

    #[must_use]
    pub fn context(&self) -> Option<&D::Context> {
        self.context.as_ref()
    }

    /// Mutable access for the render loop.
    pub fn context_mut(&mut self) -> Option<&mut D::Context> {
        self.context.as_mut()
    }
}

/// Ramp `voice` from its current level to zero over `duration` and (re)arm
/// its teardown. Any previous teardown is cancelled first.
fn fade_to_silence<C: AudioContext>(
    ctx: &mut C,
    wheel: &mut TimerWheel<VoiceId>,
    id: &VoiceId,
    voice: &mut Voice,
    now: f64,
    duration: f64,
) {
    let level = voice.gain.value_at(now);
    voice.gain = GainRamp::linear(level, 0.0, now, duration);
    ctx.schedule_gain(voice.chain, voice.gain);

    if let VoiceState::FadingOut { teardown } = voice.state {
        wheel.cancel(teardown);
    }
    let key = wheel.schedule(now + duration + TEARDOWN_MARGIN_SECS, id.clone());
    voice.state = VoiceState::FadingOut { teardown: key };
}

impl<D: AudioDevice> Drop for Mixer<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: AudioDevice> MixControl for Mixer<D> {
    fn play(&mut self, id: &VoiceId, clip: &ClipHandle, settings: &AudioSettings) -> Result<PlayOutcome, MixError> {
        Mixer::play(self, id, clip, settings)
    }

    fn stop(&mut self, id: &VoiceId) -> StopOutcome {
        Mixer::stop(self, id)
    }

    fn stop_all(&mut self) {
        Mixer::stop_all(self);
    }

    fn update_settings(&mut self, id: &VoiceId, settings: &AudioSettings) -> bool {
        Mixer::update_settings(self, id, settings)
    }
}
