//! Shared timing constants for the mix engine.

// ── Fades ───────────────────────────────────────────────────────

/// Fade-in applied when a caller leaves `fadeIn` unset, in seconds.
pub const DEFAULT_FADE_IN_SECS: f64 = 0.3;

/// Fade-out applied when a caller leaves `fadeOut` unset, in seconds.
pub const DEFAULT_FADE_OUT_SECS: f64 = 0.3;

/// Fixed fade used by `stop_all` regardless of per-voice settings.
pub const STOP_ALL_FADE_SECS: f64 = 0.1;

/// Ramp length for volume changes made through `update_settings`.
pub const SETTINGS_RAMP_SECS: f64 = 0.1;

/// Extra time after a fade-out ends before the chain is released.
pub const TEARDOWN_MARGIN_SECS: f64 = 0.1;

// ── Timer wheel ─────────────────────────────────────────────────

/// Width of one timer wheel slot, in seconds.
pub const TIMER_RESOLUTION_SECS: f64 = 0.01;

/// Number of slots in the timer wheel (one rotation = 2.56 s).
pub const TIMER_SLOTS: usize = 256;

// ── Software renderer ───────────────────────────────────────────

/// Output channel count of the software context (interleaved stereo).
pub const OUTPUT_CHANNELS: usize = 2;
