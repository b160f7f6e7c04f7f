//! Live mix engine for hotspot playback.
//!
//! The engine keeps one voice per id. Each voice is a chain of
//! source → gain → pan → output inside a single shared audio context, with its
//! own fade envelope and loop flag. Voices are created by `play`, fade out on
//! `stop`, and are torn down by a timer wheel once the fade has completed.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::Mixer`] state machine and the [`engine::MixControl`] seam |
//! | [`settings`] | Per-voice [`settings::AudioSettings`] and typed update operations |
//! | [`envelope`] | Linear gain ramps evaluated in context time |
//! | [`timer`] | Hashed timer wheel used for deferred teardown |
//! | [`context`] | Audio device / context abstraction and clip handles |
//! | [`software`] | In-process software renderer implementing the context |
//! | [`consts`] | Fade timings and other shared constants |
//! | [`error`] | [`error::MixError`] |

pub mod consts;
pub mod context;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod settings;
pub mod software;
pub mod timer;

pub use context::{AudioContext, AudioDevice, ChainId, ClipHandle, ContextState};
pub use engine::{MixControl, Mixer, PlayOutcome, StopOutcome, VoiceId, VoiceSnapshot, VoiceState};
pub use error::MixError;
pub use settings::AudioSettings;
pub use software::{SoftwareContext, SoftwareDevice};
